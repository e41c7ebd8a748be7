//! Cipher Grant Crypto - Sealing primitive for confidential budgets.
//!
//! This crate provides:
//! - `Sealer`, the contract any budget-hiding scheme must satisfy
//! - `EnvelopeSealer`, an AES-256-GCM implementation bound to a record id
//! - `RevealAuthorization`, the keyed capability a reveal must present
//! - Encrypted keystore for the sealing key

pub mod seal;
pub mod keystore;
pub mod error;

pub use seal::{EnvelopeSealer, RevealAuthorization, SealedValue, Sealer, SealingKey};
pub use keystore::{
    check_keystore, create_keystore, decrypt_keystore, encrypt_keystore, KdfParams,
};
pub use error::CryptoError;
