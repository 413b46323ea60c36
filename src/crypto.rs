//! Symmetric encryption of stored identity fields.
//!
//! Every identity column (Username, Realname, Password) and every session
//! token is ciphered with AES-256-GCM under one process-wide key derived
//! from the configured secret. Ciphertext travels hex-encoded.

use aes_gcm::aead::{Aead, Nonce};
use aes_gcm::{Aes256Gcm, Key, KeyInit};
use argon2::{Argon2, Params, Version};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

const NONCE_SIZE: usize = 12;
const KEY_LENGTH: usize = 32;

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error(transparent)]
    AesGcm(#[from] aes_gcm::Error),
    #[error("argon2 error: {0}")]
    Argon2(String),

    #[error("hex is not valid")]
    Hex(#[from] hex::FromHexError),
    #[error("decrypted data is not utf8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("ciphertext is {len} bytes, shorter than the {NONCE_SIZE} byte nonce")]
    Truncated { len: usize },
}

/// SymmetricKey holds a fixed-size key protected by Zeroizing.
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; KEY_LENGTH]>);

impl SymmetricKey {
    /// Create from raw bytes (must be 32 bytes).
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Derive key from the instance secret + salt using Argon2.
    pub fn derive_from_secret(
        secret: impl AsRef<[u8]>,
        salt: impl AsRef<[u8]>,
    ) -> Result<Self> {
        let params = Params::new(1024 * 64, 8, 2, Some(KEY_LENGTH))
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;
        let argon2 =
            Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        argon2
            .hash_password_into(secret.as_ref(), salt.as_ref(), key.as_mut())
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        Ok(Self(key))
    }

    fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// SymmetricCipher provides encrypt/decrypt operations with AES-256-GCM.
pub struct SymmetricCipher {
    key: SymmetricKey,
}

impl SymmetricCipher {
    /// Create a new [`SymmetricCipher`].
    pub fn new(key: SymmetricKey) -> Self {
        Self { key }
    }

    pub fn encrypt_and_hex(
        &self,
        plaintext: impl AsRef<[u8]>,
    ) -> Result<String> {
        let cipher_text = self.encrypt(plaintext)?;
        Ok(hex::encode(cipher_text))
    }

    pub fn decrypt_from_hex(&self, data: impl AsRef<[u8]>) -> Result<String> {
        let data = hex::decode(data)?;
        let plain = self.decrypt(data)?;
        Ok(String::from_utf8(plain)?)
    }

    /// Encrypts data returning raw bytes.
    pub fn encrypt(&self, plaintext: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let key = Key::<Aes256Gcm>::from_slice(self.key.as_slice());
        let cipher = Aes256Gcm::new(key);

        // Generate random 96-bit nonce.
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::<Aes256Gcm>::from_slice(&nonce_bytes);

        let cipher_text = cipher.encrypt(nonce, plaintext.as_ref())?;

        let mut out = Vec::with_capacity(NONCE_SIZE + cipher_text.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&cipher_text);
        Ok(out)
    }

    /// Decrypt raw data.
    pub fn decrypt(&self, data: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let data = data.as_ref();
        if data.len() < NONCE_SIZE {
            return Err(CryptoError::Truncated { len: data.len() });
        }

        let (nonce_bytes, cipher_text) = data.split_at(NONCE_SIZE);
        let nonce = Nonce::<Aes256Gcm>::clone_from_slice(nonce_bytes);

        let key = Key::<Aes256Gcm>::from_slice(self.key.as_slice());
        let cipher = Aes256Gcm::new(key);

        let plain = cipher.decrypt(&nonce, cipher_text.as_ref())?;

        Ok(plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> SymmetricCipher {
        let key =
            SymmetricKey::derive_from_secret("secret", "watchlist-salt")
                .unwrap();
        SymmetricCipher::new(key)
    }

    #[test]
    fn test_aes256_roundtrip() {
        let cipher = cipher();

        let plaintext = "alice";
        let encrypted = cipher.encrypt_and_hex(plaintext).unwrap();
        let decrypted = cipher.decrypt_from_hex(&encrypted).unwrap();

        assert_ne!(encrypted, plaintext);
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_nondeterministic_nonce() {
        let cipher = cipher();

        let a = cipher.encrypt_and_hex("alice").unwrap();
        let b = cipher.encrypt_and_hex("alice").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext_is_an_error() {
        let cipher = cipher();

        let mut encrypted = cipher.encrypt("alice").unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xff;

        assert!(cipher.decrypt(encrypted).is_err());
    }

    #[test]
    fn test_foreign_key_is_an_error() {
        let cipher = cipher();
        let other = SymmetricCipher::new(
            SymmetricKey::derive_from_secret("other", "watchlist-salt")
                .unwrap(),
        );

        let encrypted = cipher.encrypt("alice").unwrap();
        assert!(other.decrypt(encrypted).is_err());
    }

    #[test]
    fn test_garbage_inputs_do_not_panic() {
        let cipher = cipher();

        assert!(matches!(
            cipher.decrypt(b"tiny"),
            Err(CryptoError::Truncated { len: 4 })
        ));
        assert!(cipher.decrypt_from_hex("not-hex-at-all").is_err());
    }
}
