//! Isochronous channels
//!
//! Connected isochronous groups (CIG) and their streams (CIS), plus
//! broadcast isochronous groups (BIG), sequenced against the ACL links
//! they depend on.

pub mod coordinator;
pub mod types;


pub use coordinator::IsoCoordinator;
pub use types::*;
