//! HCI status and reason codes
//!
//! Only the codes the host core inspects are named; anything else travels as
//! `Status::Other`.

pub const HCI_SUCCESS: u8 = 0x00;
pub const HCI_UNKNOWN_COMMAND: u8 = 0x01;
pub const HCI_UNKNOWN_CONNECTION_ID: u8 = 0x02;
pub const HCI_HARDWARE_FAILURE: u8 = 0x03;
pub const HCI_AUTHENTICATION_FAILURE: u8 = 0x05;
pub const HCI_PIN_OR_KEY_MISSING: u8 = 0x06;
pub const HCI_MEMORY_CAPACITY_EXCEEDED: u8 = 0x07;
pub const HCI_CONNECTION_TIMEOUT: u8 = 0x08;
pub const HCI_CONNECTION_LIMIT_EXCEEDED: u8 = 0x09;
pub const HCI_CONNECTION_ALREADY_EXISTS: u8 = 0x0B;
pub const HCI_COMMAND_DISALLOWED: u8 = 0x0C;
pub const HCI_REJECTED_LIMITED_RESOURCES: u8 = 0x0D;
pub const HCI_INVALID_PARAMETERS: u8 = 0x12;
pub const HCI_REMOTE_USER_TERMINATED: u8 = 0x13;
pub const HCI_LOCAL_HOST_TERMINATED: u8 = 0x16;
pub const HCI_REPEATED_ATTEMPTS: u8 = 0x17;
pub const HCI_UNSUPPORTED_REMOTE_FEATURE: u8 = 0x1A;
pub const HCI_LMP_RESPONSE_TIMEOUT: u8 = 0x22;
pub const HCI_INSUFFICIENT_SECURITY: u8 = 0x2F;
pub const HCI_UNACCEPTABLE_CONNECTION_PARAMETERS: u8 = 0x3B;
pub const HCI_CONNECTION_FAILED_TO_ESTABLISH: u8 = 0x3E;
pub const HCI_UNKNOWN_ADVERTISING_ID: u8 = 0x42;
pub const HCI_OPERATION_CANCELLED_BY_HOST: u8 = 0x44;
