//! Security Manager: pairing, key material and the bonding store
//!
//! - `pairing` selects the pairing method and tracks one attempt per link
//! - `manager` drives attempts from start to commit or failure
//! - `bonding` keeps what a successful bonding produced, per peer identity

pub mod bonding;
pub mod constants;
pub mod keys;
pub mod manager;
pub mod pairing;
pub mod types;


pub use bonding::{
    BondPersistence, BondRecord, BondingStore, KeyType, MemoryPersistence, StoreError,
};
pub use keys::*;
pub use manager::{BondingDecision, FixedSecurity, SecurityContext, SecurityProvider, SmpManager};
pub use pairing::*;
pub use types::*;
