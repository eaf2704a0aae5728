//! Host configuration
use crate::gap::ConnectionParams;
use crate::smp::constants::*;
use crate::smp::Key128;
use std::time::Duration;

/// Configuration fixed at power-on
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// How long a passkey entry or confirmation may wait for the user
    pub user_response_timeout: Duration,
    /// How long a peer is refused after a repeated-attempts failure
    pub repeated_attempts_cooldown: Duration,
    /// Whether the local side supports LE Secure Connections
    pub secure_connections: bool,
    pub min_key_size: u8,
    pub max_key_size: u8,
    pub default_connection_params: ConnectionParams,
    /// Local IRK distributed during bonding; a random one is used if unset
    pub identity_key: Option<Key128>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            user_response_timeout: Duration::from_millis(SMP_TIMEOUT_USER_RESPONSE),
            repeated_attempts_cooldown: Duration::from_millis(SMP_REPEATED_ATTEMPTS_COOLDOWN),
            secure_connections: true,
            min_key_size: SMP_MIN_ENCRYPTION_KEY_SIZE,
            max_key_size: SMP_MAX_ENCRYPTION_KEY_SIZE,
            default_connection_params: ConnectionParams::default(),
            identity_key: None,
        }
    }
}
