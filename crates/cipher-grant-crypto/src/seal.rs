//! Sealed budgets.
//!
//! A budget is sealed at submission and stays opaque until the proposal it
//! belongs to reaches a terminal decision. Revealing requires a
//! [`RevealAuthorization`] minted by the holder of the sealing key for that
//! exact record; the plaintext only ever exists inside `reveal`.
//!
//! Envelope layout: `version(1) || nonce(12) || aes-256-gcm(wei as u128 be || tag)`,
//! with the record id as associated data.

use crate::error::CryptoError;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};
use cipher_grant_types::{Amount, Hash, Timestamp};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const ENVELOPE_VERSION: u8 = 2;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

const ENCRYPTION_CONTEXT: &str = "cipher-grant 2024-01 budget envelope encryption v1";
const AUTHORIZATION_CONTEXT: &str = "cipher-grant 2024-01 reveal authorization v1";
const KEY_ID_CONTEXT: &str = "cipher-grant 2024-01 sealing key id v1";

/// 32-byte master secret from which the sealing sub-keys are derived.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SealingKey([u8; 32]);

impl SealingKey {
    pub const LEN: usize = 32;

    /// Generate a fresh key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        if slice.len() != Self::LEN {
            return Err(CryptoError::InvalidKeyLength(slice.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Public identifier of this key. Safe to print and store.
    pub fn key_id(&self) -> Hash {
        Hash::from_bytes(blake3::derive_key(KEY_ID_CONTEXT, &self.0))
    }
}

impl fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealingKey(id={})", self.key_id().short())
    }
}

/// Opaque sealed representation of a budget.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    #[serde(with = "hex_bytes")]
    ciphertext: Vec<u8>,
    sealed_at: Timestamp,
}

impl SealedValue {
    /// Rebuild a sealed value from stored parts. Nothing is validated until reveal.
    pub fn from_parts(ciphertext: Vec<u8>, sealed_at: Timestamp) -> Self {
        Self { ciphertext, sealed_at }
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn sealed_at(&self) -> Timestamp {
        self.sealed_at
    }

    /// Short display form shown to reviewers in place of the budget.
    pub fn fingerprint(&self) -> String {
        Hash::compute(&self.ciphertext).short()
    }
}

impl fmt::Debug for SealedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedValue")
            .field("fingerprint", &self.fingerprint())
            .field("len", &self.ciphertext.len())
            .field("sealed_at", &self.sealed_at)
            .finish()
    }
}

/// Capability to reveal the value sealed under one binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealAuthorization {
    binding: u64,
    tag: Hash,
}

impl RevealAuthorization {
    /// Rebuild from transported parts. The tag is checked on use, not here.
    pub fn from_parts(binding: u64, tag: Hash) -> Self {
        Self { binding, tag }
    }

    pub fn binding(&self) -> u64 {
        self.binding
    }

    pub fn tag(&self) -> &Hash {
        &self.tag
    }
}

/// Contract for a budget-hiding scheme.
///
/// Amounts are validated when they are built, so `seal` only has to avoid
/// retaining the plaintext. `reveal` is a pure function of its inputs and must fail with
/// [`CryptoError::Unauthorized`] for any authorization not minted by
/// `authorize` for the same binding, and with [`CryptoError::CorruptCiphertext`]
/// when the payload cannot be opened.
pub trait Sealer: Send + Sync {
    /// Seal `amount` for the record identified by `binding`.
    fn seal(&self, amount: Amount, binding: u64) -> Result<SealedValue, CryptoError>;

    /// Mint the reveal capability for `binding`.
    fn authorize(&self, binding: u64) -> RevealAuthorization;

    /// Open `sealed` under `authorization`.
    fn reveal(
        &self,
        sealed: &SealedValue,
        authorization: &RevealAuthorization,
    ) -> Result<Amount, CryptoError>;
}

/// AES-256-GCM envelope sealer.
pub struct EnvelopeSealer {
    encryption_key: Zeroizing<[u8; 32]>,
    authorization_key: Zeroizing<[u8; 32]>,
    key_id: Hash,
}

impl EnvelopeSealer {
    pub fn new(key: &SealingKey) -> Self {
        Self {
            encryption_key: Zeroizing::new(blake3::derive_key(ENCRYPTION_CONTEXT, key.as_bytes())),
            authorization_key: Zeroizing::new(blake3::derive_key(
                AUTHORIZATION_CONTEXT,
                key.as_bytes(),
            )),
            key_id: key.key_id(),
        }
    }

    pub fn key_id(&self) -> Hash {
        self.key_id
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.encryption_key[..]))
    }

    fn expected_tag(&self, binding: u64) -> Hash {
        Hash::keyed_multi(&self.authorization_key, &[b"reveal".as_slice(), &binding.to_be_bytes()])
    }
}

impl fmt::Debug for EnvelopeSealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnvelopeSealer(key={})", self.key_id.short())
    }
}

impl Sealer for EnvelopeSealer {
    fn seal(&self, amount: Amount, binding: u64) -> Result<SealedValue, CryptoError> {
        let encoded = Zeroizing::new(amount.to_be_bytes());

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let aad = binding.to_be_bytes();
        let body = self
            .cipher()
            .encrypt(&nonce, Payload { msg: &encoded[..], aad: &aad })
            .map_err(|e| CryptoError::EncryptionFailed(format!("{:?}", e)))?;

        let mut ciphertext = Vec::with_capacity(HEADER_LEN + body.len());
        ciphertext.push(ENVELOPE_VERSION);
        ciphertext.extend_from_slice(&nonce);
        ciphertext.extend_from_slice(&body);

        let sealed = SealedValue::from_parts(ciphertext, Timestamp::now());
        tracing::debug!(binding, fingerprint = %sealed.fingerprint(), "Sealed value");
        Ok(sealed)
    }

    fn authorize(&self, binding: u64) -> RevealAuthorization {
        RevealAuthorization {
            binding,
            tag: self.expected_tag(binding),
        }
    }

    fn reveal(
        &self,
        sealed: &SealedValue,
        authorization: &RevealAuthorization,
    ) -> Result<Amount, CryptoError> {
        if !self.expected_tag(authorization.binding).ct_eq(&authorization.tag) {
            tracing::warn!(binding = authorization.binding, "Rejected forged reveal authorization");
            return Err(CryptoError::Unauthorized);
        }

        let bytes = sealed.ciphertext();
        if bytes.len() < HEADER_LEN + TAG_LEN {
            return Err(CryptoError::CorruptCiphertext(format!(
                "payload too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0] != ENVELOPE_VERSION {
            return Err(CryptoError::CorruptCiphertext(format!(
                "unknown envelope version {}",
                bytes[0]
            )));
        }

        let nonce = Nonce::from_slice(&bytes[1..HEADER_LEN]);
        let aad = authorization.binding.to_be_bytes();
        let plaintext = Zeroizing::new(
            self.cipher()
                .decrypt(nonce, Payload { msg: &bytes[HEADER_LEN..], aad: &aad })
                .map_err(|_| {
                    tracing::warn!(binding = authorization.binding, "Sealed payload failed to open");
                    CryptoError::CorruptCiphertext("authentication failed".to_string())
                })?,
        );

        let raw: [u8; Amount::ENCODED_LEN] = plaintext.as_slice().try_into().map_err(|_| {
            CryptoError::CorruptCiphertext(format!("plaintext length {}", plaintext.len()))
        })?;
        Ok(Amount::from_be_bytes(raw))
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}
