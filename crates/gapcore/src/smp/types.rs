//! Type definitions for the Security Manager Protocol
use super::constants::*;
use bitflags::bitflags;
use std::fmt;
use thiserror::Error;

/// Distinct ways a pairing or encryption attempt can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SecurityFailure {
    #[error("Authentication failure")]
    AuthenticationFailed,

    #[error("Too many pairing attempts")]
    RepeatedAttempts,

    #[error("Rejected by user")]
    UserRejected,

    #[error("Passkey entry failed")]
    PasskeyEntryFailed,

    #[error("OOB data not available")]
    OobNotAvailable,

    #[error("Authentication requirements not met")]
    AuthenticationRequirements,

    #[error("Confirm value failed")]
    ConfirmValueFailed,

    #[error("Pairing not supported")]
    PairingNotSupported,

    #[error("Encryption key size too small")]
    EncryptionKeySize,

    #[error("Link key missing on peer")]
    KeyMissing,

    #[error("Numeric comparison failed")]
    NumericComparisonFailed,

    #[error("DHKey check failed")]
    DhKeyCheckFailed,

    #[error("Unspecified reason 0x{0:02X}")]
    Unspecified(u8),
}

impl SecurityFailure {
    /// Map an SMP pairing-failed reason code
    pub fn from_reason(reason: u8) -> Self {
        match reason {
            SMP_REASON_PASSKEY_ENTRY_FAILED => SecurityFailure::PasskeyEntryFailed,
            SMP_REASON_OOB_NOT_AVAILABLE => SecurityFailure::OobNotAvailable,
            SMP_REASON_AUTHENTICATION_REQUIREMENTS => SecurityFailure::AuthenticationRequirements,
            SMP_REASON_CONFIRM_VALUE_FAILED => SecurityFailure::ConfirmValueFailed,
            SMP_REASON_PAIRING_NOT_SUPPORTED => SecurityFailure::PairingNotSupported,
            SMP_REASON_ENCRYPTION_KEY_SIZE => SecurityFailure::EncryptionKeySize,
            SMP_REASON_REPEATED_ATTEMPTS => SecurityFailure::RepeatedAttempts,
            SMP_REASON_DHKEY_CHECK_FAILED => SecurityFailure::DhKeyCheckFailed,
            SMP_REASON_NUMERIC_COMPARISON_FAILED => SecurityFailure::NumericComparisonFailed,
            other => SecurityFailure::Unspecified(other),
        }
    }

    /// Reason code sent to the peer when the local side aborts
    pub fn reason_code(&self) -> u8 {
        match self {
            SecurityFailure::PasskeyEntryFailed | SecurityFailure::UserRejected => {
                SMP_REASON_PASSKEY_ENTRY_FAILED
            }
            SecurityFailure::OobNotAvailable => SMP_REASON_OOB_NOT_AVAILABLE,
            SecurityFailure::AuthenticationRequirements => SMP_REASON_AUTHENTICATION_REQUIREMENTS,
            SecurityFailure::ConfirmValueFailed => SMP_REASON_CONFIRM_VALUE_FAILED,
            SecurityFailure::PairingNotSupported => SMP_REASON_PAIRING_NOT_SUPPORTED,
            SecurityFailure::EncryptionKeySize => SMP_REASON_ENCRYPTION_KEY_SIZE,
            SecurityFailure::RepeatedAttempts => SMP_REASON_REPEATED_ATTEMPTS,
            SecurityFailure::DhKeyCheckFailed => SMP_REASON_DHKEY_CHECK_FAILED,
            SecurityFailure::NumericComparisonFailed => SMP_REASON_NUMERIC_COMPARISON_FAILED,
            SecurityFailure::AuthenticationFailed | SecurityFailure::KeyMissing => {
                SMP_REASON_UNSPECIFIED_REASON
            }
            SecurityFailure::Unspecified(code) => *code,
        }
    }
}

/// IO Capability types for pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    KeyboardDisplay,
}

impl IoCapability {
    /// Convert to u8 value for protocol
    pub fn to_u8(&self) -> u8 {
        match self {
            IoCapability::DisplayOnly => SMP_IO_CAPABILITY_DISPLAY_ONLY,
            IoCapability::DisplayYesNo => SMP_IO_CAPABILITY_DISPLAY_YES_NO,
            IoCapability::KeyboardOnly => SMP_IO_CAPABILITY_KEYBOARD_ONLY,
            IoCapability::NoInputNoOutput => SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT,
            IoCapability::KeyboardDisplay => SMP_IO_CAPABILITY_KEYBOARD_DISPLAY,
        }
    }

    /// Convert from u8 value from protocol
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            SMP_IO_CAPABILITY_DISPLAY_ONLY => Some(IoCapability::DisplayOnly),
            SMP_IO_CAPABILITY_DISPLAY_YES_NO => Some(IoCapability::DisplayYesNo),
            SMP_IO_CAPABILITY_KEYBOARD_ONLY => Some(IoCapability::KeyboardOnly),
            SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT => Some(IoCapability::NoInputNoOutput),
            SMP_IO_CAPABILITY_KEYBOARD_DISPLAY => Some(IoCapability::KeyboardDisplay),
            _ => None,
        }
    }
}

impl fmt::Display for IoCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoCapability::DisplayOnly => write!(f, "Display Only"),
            IoCapability::DisplayYesNo => write!(f, "Display Yes/No"),
            IoCapability::KeyboardOnly => write!(f, "Keyboard Only"),
            IoCapability::NoInputNoOutput => write!(f, "No Input No Output"),
            IoCapability::KeyboardDisplay => write!(f, "Keyboard Display"),
        }
    }
}

bitflags! {
    /// Authentication requirement bits of a pairing request/response
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AuthReq: u8 {
        const BONDING = SMP_AUTH_REQ_BONDING;
        const MITM = SMP_AUTH_REQ_MITM;
        const SECURE_CONNECTIONS = SMP_AUTH_REQ_SC;
        const KEYPRESS = SMP_AUTH_REQ_KEYPRESS;
        const CT2 = SMP_AUTH_REQ_CT2;
    }
}

bitflags! {
    /// Key distribution bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyDistribution: u8 {
        /// LTK, EDIV and Rand
        const ENC_KEY = SMP_KEY_DIST_ENC_KEY;
        /// IRK and identity address
        const ID_KEY = SMP_KEY_DIST_ID_KEY;
        /// CSRK
        const SIGN_KEY = SMP_KEY_DIST_SIGN_KEY;
        const LINK_KEY = SMP_KEY_DIST_LINK_KEY;
    }
}

/// Out-of-band pairing data handed over by the application
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OobData {
    /// Random value (r)
    pub r: [u8; 16],
    /// Confirm value (c)
    pub c: [u8; 16],
}

/// One side's half of the capability exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingFeatures {
    pub io_capability: IoCapability,
    pub oob_data_present: bool,
    pub auth_req: AuthReq,
    /// Maximum encryption key size (7-16)
    pub max_key_size: u8,
    pub initiator_key_dist: KeyDistribution,
    pub responder_key_dist: KeyDistribution,
}

impl Default for PairingFeatures {
    fn default() -> Self {
        Self {
            io_capability: IoCapability::NoInputNoOutput,
            oob_data_present: false,
            auth_req: AuthReq::BONDING,
            max_key_size: SMP_MAX_ENCRYPTION_KEY_SIZE,
            initiator_key_dist: KeyDistribution::ENC_KEY
                | KeyDistribution::ID_KEY
                | KeyDistribution::SIGN_KEY,
            responder_key_dist: KeyDistribution::ENC_KEY
                | KeyDistribution::ID_KEY
                | KeyDistribution::SIGN_KEY,
        }
    }
}

/// Pairing Role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingRole {
    /// Initiator of the pairing (the Central)
    Initiator,
    /// Responder to pairing (the Peripheral)
    Responder,
}

/// Security level for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SecurityLevel {
    /// No security (unencrypted)
    #[default]
    None = 0,
    /// Encrypted, keys obtained without MITM protection
    Unauthenticated = 1,
    /// Encrypted, keys obtained with MITM protection
    Authenticated = 2,
    /// Authenticated LE Secure Connections
    AuthenticatedSecureConnections = 3,
}

impl SecurityLevel {
    pub fn is_encrypted(&self) -> bool {
        *self >= SecurityLevel::Unauthenticated
    }

    pub fn is_authenticated(&self) -> bool {
        *self >= SecurityLevel::Authenticated
    }

    pub fn to_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SecurityLevel::None),
            1 => Some(SecurityLevel::Unauthenticated),
            2 => Some(SecurityLevel::Authenticated),
            3 => Some(SecurityLevel::AuthenticatedSecureConnections),
            _ => None,
        }
    }
}
