use crate::error::CryptoError;
use crate::seal::SealingKey;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AesRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use cipher_grant_types::Hash;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Encrypted keystore file holding the budget sealing key.
/// Uses argon2id for key derivation, AES-256-GCM for encryption.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KeystoreFile {
    pub version: u32,  // 1
    pub id: String,    // UUID
    pub key_id: String, // public id of the sealing key
    pub crypto: KeystoreCrypto,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KeystoreCrypto {
    pub cipher: String,         // "aes-256-gcm"
    pub ciphertext: String,     // hex
    pub cipherparams: CipherParams,
    pub kdf: String,            // "argon2id"
    pub kdfparams: KdfParams,
    pub mac: String,            // hex, blake3(derived_key[16..32] || ciphertext)
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CipherParams {
    pub iv: String,  // hex, 12 bytes nonce
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    #[serde(default)]
    pub salt: String,
    pub parallelism: u32,
    pub memory_cost: u32,
    pub time_cost: u32,
    pub output_len: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: String::new(),
            parallelism: 4,
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            output_len: 32,
        }
    }
}

fn argon2_for(params: &KdfParams) -> Result<Argon2<'static>, CryptoError> {
    let argon_params = argon2::Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(params.output_len as usize),
    )
    .map_err(|e| CryptoError::KeyDerivationFailed(format!("{:?}", e)))?;

    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon_params,
    ))
}

fn derive_key(
    password: &str,
    salt: &SaltString,
    params: &KdfParams,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if params.output_len != 32 {
        return Err(CryptoError::KeystoreError(format!(
            "Unsupported KDF output length: {}",
            params.output_len
        )));
    }

    let password_hash = argon2_for(params)?
        .hash_password(password.as_bytes(), salt)
        .map_err(|e| CryptoError::KeyDerivationFailed(format!("{:?}", e)))?;

    let derived = password_hash.hash.ok_or_else(|| {
        CryptoError::KeyDerivationFailed("No hash generated".to_string())
    })?;

    Ok(Zeroizing::new(derived.as_bytes().to_vec()))
}

fn keystore_mac(derived_key: &[u8], ciphertext: &[u8]) -> Hash {
    Hash::compute_multi(&[&derived_key[16..32], ciphertext])
}

/// Encrypt a sealing key with a password and save it to a keystore file.
pub fn encrypt_keystore(
    key: &SealingKey,
    password: &str,
    path: &Path,
    params: &KdfParams,
) -> Result<(), CryptoError> {
    let salt = SaltString::generate(&mut OsRng);
    let derived_key = derive_key(password, &salt, params)?;

    let nonce = Aes256Gcm::generate_nonce(&mut AesRng);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived_key[..]));
    let ciphertext = cipher
        .encrypt(&nonce, &key.as_bytes()[..])
        .map_err(|e| CryptoError::EncryptionFailed(format!("{:?}", e)))?;

    let mac = keystore_mac(&derived_key, &ciphertext);

    let keystore = KeystoreFile {
        version: 1,
        id: uuid::Uuid::new_v4().to_string(),
        key_id: key.key_id().to_string(),
        crypto: KeystoreCrypto {
            cipher: "aes-256-gcm".to_string(),
            ciphertext: hex::encode(&ciphertext),
            cipherparams: CipherParams {
                iv: hex::encode(nonce),
            },
            kdf: "argon2id".to_string(),
            kdfparams: KdfParams {
                salt: salt.to_string(),
                ..params.clone()
            },
            mac: mac.to_hex(),
        },
    };

    let json = serde_json::to_string_pretty(&keystore)
        .map_err(|e| CryptoError::Serialization(e.to_string()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)?;

    tracing::info!(key_id = %key.key_id().short(), path = %path.display(), "Sealing key stored");
    Ok(())
}

/// Decrypt a keystore file with a password.
pub fn decrypt_keystore(
    path: &Path,
    password: &str,
) -> Result<SealingKey, CryptoError> {
    let json = std::fs::read_to_string(path)?;

    let keystore: KeystoreFile = serde_json::from_str(&json)
        .map_err(|e| CryptoError::KeystoreError(format!("Parse error: {}", e)))?;

    if keystore.version != 1 {
        return Err(CryptoError::KeystoreError(
            format!("Unsupported keystore version: {}", keystore.version)
        ));
    }

    let params = &keystore.crypto.kdfparams;
    let salt = SaltString::from_b64(&params.salt)
        .map_err(|_| CryptoError::KeystoreError("Invalid salt".to_string()))?;

    let derived_key = derive_key(password, &salt, params)?;

    let ciphertext = hex::decode(&keystore.crypto.ciphertext)
        .map_err(|_| CryptoError::KeystoreError("Invalid ciphertext".to_string()))?;

    let expected_mac = keystore_mac(&derived_key, &ciphertext);
    let actual_mac = Hash::from_str(&keystore.crypto.mac)
        .map_err(|_| CryptoError::KeystoreError("Invalid MAC".to_string()))?;

    if !expected_mac.ct_eq(&actual_mac) {
        return Err(CryptoError::InvalidPassword);
    }

    let nonce_bytes = hex::decode(&keystore.crypto.cipherparams.iv)
        .map_err(|_| CryptoError::KeystoreError("Invalid IV".to_string()))?;
    if nonce_bytes.len() != 12 {
        return Err(CryptoError::KeystoreError("Invalid IV".to_string()));
    }
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived_key[..]));
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed("Decryption failed".to_string()))?,
    );

    let key = SealingKey::from_slice(&plaintext)?;
    if key.key_id().to_string() != keystore.key_id {
        return Err(CryptoError::KeystoreError("Key id mismatch".to_string()));
    }

    Ok(key)
}

/// Create a new random sealing key and store it in a keystore file.
pub fn create_keystore(
    password: &str,
    path: &Path,
    params: &KdfParams,
) -> Result<SealingKey, CryptoError> {
    let key = SealingKey::generate();
    encrypt_keystore(&key, password, path, params)?;
    Ok(key)
}

/// Check if a keystore file exists and is valid.
pub fn check_keystore(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }

    match std::fs::read_to_string(path) {
        Ok(json) => serde_json::from_str::<KeystoreFile>(&json).is_ok(),
        Err(_) => false,
    }
}
