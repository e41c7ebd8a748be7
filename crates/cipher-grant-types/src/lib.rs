//! Cipher Grant Types - Core type definitions for the Cipher Grant DAO.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - Addresses (20-byte, `0x`-prefixed hex)
//! - Hashes (32-byte, blake3 digests)
//! - Amounts (ETH held as integer wei)
//! - Timestamps (unix milliseconds)

pub mod address;
pub mod hash;
pub mod amount;
pub mod timestamp;
pub mod error;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use hash::Hash;
pub use amount::{Amount, ETH_DECIMALS, WEI_PER_ETH};
pub use timestamp::Timestamp;
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Address, Amount, Hash, Timestamp, TypesError};
}
