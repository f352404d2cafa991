//! Local symmetric encryption using AES-256-GCM.
//!
//! When no external secret store is configured (or a store write fails
//! mid-provisioning), tenant connection strings are encrypted with a local
//! master key and persisted in the registry instead. The wire form is
//! `base64(nonce || ciphertext || tag)` with a random 12-byte nonce per
//! encryption.
//!
//! The master key is a base64-encoded 32-byte value loaded from
//! `TENANTPLANE_ENCRYPTION_KEY` (generate one with `openssl rand -base64 32`).

use base64::Engine;
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use tracing::{debug, error};

use super::error::{Result, SecretsError};
use super::types::SecretString;

/// Size of AES-256-GCM nonce in bytes
const NONCE_SIZE: usize = 12;

/// Size of AES-256-GCM tag in bytes
const TAG_SIZE: usize = 16;

/// Configuration for the local encryption service
#[derive(Debug, Clone)]
pub struct SecretEncryptionConfig {
    /// Base64-encoded 32-byte master encryption key
    pub master_key_base64: String,
}

impl SecretEncryptionConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let master_key_base64 = std::env::var("TENANTPLANE_ENCRYPTION_KEY").map_err(|_| {
            SecretsError::config_error(
                "TENANTPLANE_ENCRYPTION_KEY environment variable not set. \
                 Generate a key with: openssl rand -base64 32",
            )
        })?;

        Ok(Self { master_key_base64 })
    }

    /// Fixed-key configuration for tests. Never use in production.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        let test_key = [0x42u8; 32];
        Self { master_key_base64: base64::engine::general_purpose::STANDARD.encode(test_key) }
    }
}

/// Single-use nonce sequence for AES-GCM
struct SingleNonce {
    nonce: Option<[u8; NONCE_SIZE]>,
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.nonce.take().map(Nonce::assume_unique_for_key).ok_or(ring::error::Unspecified)
    }
}

/// Local symmetric encryption service for connection strings.
#[derive(Clone)]
pub struct SecretEncryption {
    key_bytes: Arc<[u8; 32]>,
    rng: Arc<SystemRandom>,
}

impl SecretEncryption {
    /// Create a new encryption service from configuration.
    pub fn new(config: &SecretEncryptionConfig) -> Result<Self> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(&config.master_key_base64)
            .map_err(|e| {
                SecretsError::config_error(format!(
                    "Invalid base64 in TENANTPLANE_ENCRYPTION_KEY: {}",
                    e
                ))
            })?;

        if key_bytes.len() != 32 {
            return Err(SecretsError::config_error(format!(
                "TENANTPLANE_ENCRYPTION_KEY must be 32 bytes (256 bits), got {} bytes",
                key_bytes.len()
            )));
        }

        let mut key_array = [0u8; 32];
        key_array.copy_from_slice(&key_bytes);

        debug!("Local secret encryption initialized");

        Ok(Self { key_bytes: Arc::new(key_array), rng: Arc::new(SystemRandom::new()) })
    }

    /// Encrypt a plaintext string into the `base64(nonce || ciphertext)` wire form.
    pub fn encrypt_string(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng.fill(&mut nonce_bytes).map_err(|_| {
            error!("Failed to generate random nonce");
            SecretsError::encryption_failed("Failed to generate random nonce")
        })?;

        let unbound_key = UnboundKey::new(&AES_256_GCM, &*self.key_bytes)
            .map_err(|_| SecretsError::encryption_failed("Failed to create encryption key"))?;

        let nonce_sequence = SingleNonce { nonce: Some(nonce_bytes) };
        let mut sealing_key = aead::SealingKey::new(unbound_key, nonce_sequence);

        let mut buffer = plaintext.as_bytes().to_vec();
        buffer.reserve(TAG_SIZE);

        sealing_key
            .seal_in_place_append_tag(Aad::empty(), &mut buffer)
            .map_err(|_| SecretsError::encryption_failed("AES-GCM seal failed"))?;

        let mut wire = Vec::with_capacity(NONCE_SIZE + buffer.len());
        wire.extend_from_slice(&nonce_bytes);
        wire.extend_from_slice(&buffer);

        Ok(base64::engine::general_purpose::STANDARD.encode(wire))
    }

    /// Decrypt a `base64(nonce || ciphertext)` value back to the plaintext.
    pub fn decrypt_string(&self, ciphertext: &str) -> Result<SecretString> {
        let wire = base64::engine::general_purpose::STANDARD.decode(ciphertext).map_err(|e| {
            SecretsError::encryption_failed(format!("Ciphertext is not valid base64: {}", e))
        })?;

        if wire.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SecretsError::encryption_failed(
                "Ciphertext too short (missing nonce or authentication tag)",
            ));
        }

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(&wire[..NONCE_SIZE]);

        let unbound_key = UnboundKey::new(&AES_256_GCM, &*self.key_bytes)
            .map_err(|_| SecretsError::encryption_failed("Failed to create decryption key"))?;

        let nonce_sequence = SingleNonce { nonce: Some(nonce_bytes) };
        let mut opening_key = aead::OpeningKey::new(unbound_key, nonce_sequence);

        let mut buffer = wire[NONCE_SIZE..].to_vec();
        let plaintext = opening_key.open_in_place(Aad::empty(), &mut buffer).map_err(|_| {
            error!("Decryption failed - possible tampering or wrong key");
            SecretsError::encryption_failed("AES-GCM authentication failed")
        })?;

        let text = std::str::from_utf8(plaintext)
            .map_err(|_| SecretsError::encryption_failed("Decrypted value is not valid UTF-8"))?;

        Ok(SecretString::new(text))
    }
}

impl std::fmt::Debug for SecretEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretEncryption").field("key_bytes", &"[REDACTED]").finish()
    }
}
