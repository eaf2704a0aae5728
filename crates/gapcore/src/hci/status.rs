//! Status codes carried by confirmations and indications

use super::constants::*;
use std::fmt;

/// HCI status / reason code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    UnknownCommand,
    UnknownConnectionId,
    HardwareFailure,
    AuthenticationFailure,
    PinOrKeyMissing,
    MemoryCapacityExceeded,
    ConnectionTimeout,
    ConnectionLimitExceeded,
    ConnectionAlreadyExists,
    CommandDisallowed,
    RejectedLimitedResources,
    InvalidParameters,
    RemoteUserTerminated,
    LocalHostTerminated,
    RepeatedAttempts,
    UnsupportedRemoteFeature,
    LmpResponseTimeout,
    InsufficientSecurity,
    UnacceptableConnectionParameters,
    ConnectionFailedToEstablish,
    UnknownAdvertisingId,
    OperationCancelledByHost,
    /// Any code the host core does not interpret
    Other(u8),
}

impl Status {
    pub fn is_success(&self) -> bool {
        *self == Status::Success
    }

    /// Convert to u8 value for protocol
    pub fn to_u8(&self) -> u8 {
        match self {
            Status::Success => HCI_SUCCESS,
            Status::UnknownCommand => HCI_UNKNOWN_COMMAND,
            Status::UnknownConnectionId => HCI_UNKNOWN_CONNECTION_ID,
            Status::HardwareFailure => HCI_HARDWARE_FAILURE,
            Status::AuthenticationFailure => HCI_AUTHENTICATION_FAILURE,
            Status::PinOrKeyMissing => HCI_PIN_OR_KEY_MISSING,
            Status::MemoryCapacityExceeded => HCI_MEMORY_CAPACITY_EXCEEDED,
            Status::ConnectionTimeout => HCI_CONNECTION_TIMEOUT,
            Status::ConnectionLimitExceeded => HCI_CONNECTION_LIMIT_EXCEEDED,
            Status::ConnectionAlreadyExists => HCI_CONNECTION_ALREADY_EXISTS,
            Status::CommandDisallowed => HCI_COMMAND_DISALLOWED,
            Status::RejectedLimitedResources => HCI_REJECTED_LIMITED_RESOURCES,
            Status::InvalidParameters => HCI_INVALID_PARAMETERS,
            Status::RemoteUserTerminated => HCI_REMOTE_USER_TERMINATED,
            Status::LocalHostTerminated => HCI_LOCAL_HOST_TERMINATED,
            Status::RepeatedAttempts => HCI_REPEATED_ATTEMPTS,
            Status::UnsupportedRemoteFeature => HCI_UNSUPPORTED_REMOTE_FEATURE,
            Status::LmpResponseTimeout => HCI_LMP_RESPONSE_TIMEOUT,
            Status::InsufficientSecurity => HCI_INSUFFICIENT_SECURITY,
            Status::UnacceptableConnectionParameters => HCI_UNACCEPTABLE_CONNECTION_PARAMETERS,
            Status::ConnectionFailedToEstablish => HCI_CONNECTION_FAILED_TO_ESTABLISH,
            Status::UnknownAdvertisingId => HCI_UNKNOWN_ADVERTISING_ID,
            Status::OperationCancelledByHost => HCI_OPERATION_CANCELLED_BY_HOST,
            Status::Other(code) => *code,
        }
    }

    /// Convert from u8 value from protocol
    pub fn from_u8(value: u8) -> Self {
        match value {
            HCI_SUCCESS => Status::Success,
            HCI_UNKNOWN_COMMAND => Status::UnknownCommand,
            HCI_UNKNOWN_CONNECTION_ID => Status::UnknownConnectionId,
            HCI_HARDWARE_FAILURE => Status::HardwareFailure,
            HCI_AUTHENTICATION_FAILURE => Status::AuthenticationFailure,
            HCI_PIN_OR_KEY_MISSING => Status::PinOrKeyMissing,
            HCI_MEMORY_CAPACITY_EXCEEDED => Status::MemoryCapacityExceeded,
            HCI_CONNECTION_TIMEOUT => Status::ConnectionTimeout,
            HCI_CONNECTION_LIMIT_EXCEEDED => Status::ConnectionLimitExceeded,
            HCI_CONNECTION_ALREADY_EXISTS => Status::ConnectionAlreadyExists,
            HCI_COMMAND_DISALLOWED => Status::CommandDisallowed,
            HCI_REJECTED_LIMITED_RESOURCES => Status::RejectedLimitedResources,
            HCI_INVALID_PARAMETERS => Status::InvalidParameters,
            HCI_REMOTE_USER_TERMINATED => Status::RemoteUserTerminated,
            HCI_LOCAL_HOST_TERMINATED => Status::LocalHostTerminated,
            HCI_REPEATED_ATTEMPTS => Status::RepeatedAttempts,
            HCI_UNSUPPORTED_REMOTE_FEATURE => Status::UnsupportedRemoteFeature,
            HCI_LMP_RESPONSE_TIMEOUT => Status::LmpResponseTimeout,
            HCI_INSUFFICIENT_SECURITY => Status::InsufficientSecurity,
            HCI_UNACCEPTABLE_CONNECTION_PARAMETERS => Status::UnacceptableConnectionParameters,
            HCI_CONNECTION_FAILED_TO_ESTABLISH => Status::ConnectionFailedToEstablish,
            HCI_UNKNOWN_ADVERTISING_ID => Status::UnknownAdvertisingId,
            HCI_OPERATION_CANCELLED_BY_HOST => Status::OperationCancelledByHost,
            other => Status::Other(other),
        }
    }
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        Status::from_u8(value)
    }
}

impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        value.to_u8()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Other(code) => write!(f, "status 0x{:02X}", code),
            known => write!(f, "{:?} (0x{:02X})", known, known.to_u8()),
        }
    }
}
