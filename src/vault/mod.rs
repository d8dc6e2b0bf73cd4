// vault/mod.rs - CredentialVault
// Symmetric encryption of secret strings into an {iv, content} pair

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const IV_LEN: usize = 12;
const PASSWORD_LEN: usize = 20;

const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!#$%&*+-=?@^_";

/// Errors from the credential vault. Everything except `Encryption` is a
/// decryption failure: malformed input or key material that does not match.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault secret key is empty")]
    EmptyKey,

    #[error("Malformed initialization vector: {0}")]
    MalformedIv(String),

    #[error("Malformed secret content: {0}")]
    MalformedContent(String),

    #[error("No secret content is set")]
    MissingContent,

    #[error("Secret could not be decrypted with the configured key")]
    KeyMismatch,

    #[error("Decrypted secret is not valid UTF-8")]
    InvalidUtf8,

    #[error("Encryption failed: {0}")]
    Encryption(String),
}

/// Secret material as stored at rest and published to the runtime store.
///
/// A `None` content means "no secret set", which is different from an
/// encrypted empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EncryptedSecret {
    pub iv: String,
    pub content: Option<String>,
}

impl EncryptedSecret {
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.content.is_some()
    }
}

/// AES-256-GCM vault keyed from a configured secret.
#[derive(Clone)]
pub struct CredentialVault {
    key: [u8; 32],
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Derive the 256-bit key from an operator-supplied secret.
    pub fn from_secret(secret: &str) -> Result<Self, VaultError> {
        if secret.is_empty() {
            return Err(VaultError::EmptyKey);
        }
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Ok(Self { key })
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    /// Encrypt with a fresh random IV per call.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, VaultError> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| VaultError::Encryption(format!("AES-GCM encrypt: {e}")))?;

        Ok(EncryptedSecret {
            iv: hex::encode(iv),
            content: Some(hex::encode(ciphertext)),
        })
    }

    pub fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, VaultError> {
        let content = secret.content.as_deref().ok_or(VaultError::MissingContent)?;

        let iv = hex::decode(&secret.iv).map_err(|e| VaultError::MalformedIv(e.to_string()))?;
        if iv.len() != IV_LEN {
            return Err(VaultError::MalformedIv(format!(
                "expected {} bytes, got {}",
                IV_LEN,
                iv.len()
            )));
        }

        let ciphertext =
            hex::decode(content).map_err(|e| VaultError::MalformedContent(e.to_string()))?;

        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
            .map_err(|_| VaultError::KeyMismatch)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::InvalidUtf8)
    }

    /// Decrypt when a secret is set, `None` otherwise.
    pub fn decrypt_optional(&self, secret: &EncryptedSecret) -> Result<Option<String>, VaultError> {
        if secret.is_set() {
            self.decrypt(secret).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Random credential for a freshly provisioned administrator account.
    pub fn generate_password(&self) -> String {
        generate_password()
    }
}

/// Draws from the OS RNG; always contains one character of every class.
pub fn generate_password() -> String {
    let mut rng = OsRng;
    let classes = [LOWER, UPPER, DIGITS, SYMBOLS];
    let alphabet: Vec<u8> = classes.concat();

    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while chars.len() < PASSWORD_LEN {
        chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}
