//! Encrypted device credentials.
//!
//! Passwords are sealed with AES-256-GCM under a key derived from a master
//! secret (PBKDF2-HMAC-SHA256, [`PBKDF2_ITERATIONS`] rounds). The sealed form
//! is `nonce || ciphertext`, stored as base64 when serialized.
//!
//! ```rust,no_run
//! use oltlink::CredentialVault;
//! use secrecy::SecretString;
//!
//! # fn main() -> oltlink::Result<()> {
//! let mut vault = CredentialVault::new(&SecretString::from("master-secret"));
//! vault.store_credentials("olt-01", "admin", &SecretString::from("hunter2"))?;
//! let credentials = vault.get_credentials("olt-01")?;
//! assert_eq!(credentials.username, "admin");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// PBKDF2 rounds for master key derivation.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Length of the random salt drawn by [`CredentialVault::new`].
pub const SALT_LEN: usize = 16;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// AES-256 key derived from a master secret. Wiped on drop.
#[derive(Clone)]
pub struct EncryptionKey {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl EncryptionKey {
    /// Derive a key from `master` and `salt`. Deliberately slow.
    pub fn derive(master: &SecretString, salt: &[u8]) -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2_hmac::<Sha256>(
            master.expose_secret().as_bytes(),
            salt,
            PBKDF2_ITERATIONS,
            &mut key[..],
        );
        Self { key }
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key[..]))
    }

    /// Seal `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedPassword> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| Error::credential("encryption failed"))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(EncryptedPassword(blob))
    }

    /// Open a sealed password. Fails on a wrong key or a modified blob.
    pub fn decrypt(&self, password: &EncryptedPassword) -> Result<SecretString> {
        let (nonce, ciphertext) = password.split()?;
        let plaintext = Zeroizing::new(
            self.cipher()
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| Error::credential("decryption failed (wrong key or tampered data)"))?,
        );
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| Error::credential("decrypted password is not valid UTF-8"))?;
        Ok(SecretString::from(text))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// A sealed password: `nonce || ciphertext || tag`.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedPassword(Vec<u8>);

impl EncryptedPassword {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let blob = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::credential(format!("invalid base64 password blob: {}", e)))?;
        Self::from_bytes(blob)
    }

    pub fn from_bytes(blob: Vec<u8>) -> Result<Self> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::credential(format!(
                "password blob too short ({} bytes)",
                blob.len()
            )));
        }
        Ok(Self(blob))
    }

    fn split(&self) -> Result<(&[u8], &[u8])> {
        if self.0.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::credential("password blob too short"));
        }
        Ok(self.0.split_at(NONCE_LEN))
    }
}

impl fmt::Debug for EncryptedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedPassword({} bytes)", self.0.len())
    }
}

impl Serialize for EncryptedPassword {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for EncryptedPassword {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// A vault entry as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub username: String,
    pub password: EncryptedPassword,
}

/// Decrypted login for one device.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// In-memory store of encrypted credentials, keyed by device id.
///
/// Vaults built from the same master secret and salt share a key, so a
/// salt persisted next to the stored entries (see [`salt`](Self::salt))
/// is enough to reopen them.
pub struct CredentialVault {
    key: EncryptionKey,
    salt: Vec<u8>,
    entries: HashMap<String, StoredCredential>,
}

impl CredentialVault {
    /// Create a vault with a fresh random salt.
    pub fn new(master: &SecretString) -> Self {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Self::with_salt(master, salt)
    }

    /// Create a vault from a previously persisted salt.
    pub fn with_salt(master: &SecretString, salt: impl Into<Vec<u8>>) -> Self {
        let salt = salt.into();
        Self {
            key: EncryptionKey::derive(master, &salt),
            salt,
            entries: HashMap::new(),
        }
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn encryption_key(&self) -> &EncryptionKey {
        &self.key
    }

    /// Encrypt and store a login, replacing any previous entry.
    pub fn store_credentials(
        &mut self,
        device_id: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<()> {
        let sealed = self.key.encrypt(password.expose_secret())?;
        debug!("Stored credentials for device {}", device_id);
        self.entries.insert(
            device_id.to_string(),
            StoredCredential {
                username: username.to_string(),
                password: sealed,
            },
        );
        Ok(())
    }

    /// Add an already encrypted entry, e.g. one loaded from disk.
    pub fn insert_encrypted(&mut self, device_id: &str, credential: StoredCredential) {
        self.entries.insert(device_id.to_string(), credential);
    }

    /// Decrypt the login stored for `device_id`.
    pub fn get_credentials(&self, device_id: &str) -> Result<Credentials> {
        let stored = self.get_encrypted(device_id)?;
        Ok(Credentials {
            username: stored.username.clone(),
            password: self.key.decrypt(&stored.password)?,
        })
    }

    pub fn get_encrypted(&self, device_id: &str) -> Result<&StoredCredential> {
        self.entries
            .get(device_id)
            .ok_or_else(|| Error::not_found(format!("credentials for device {}", device_id)))
    }

    /// Returns whether an entry was removed.
    pub fn remove_credentials(&mut self, device_id: &str) -> bool {
        self.entries.remove(device_id).is_some()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.entries.contains_key(device_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut devices: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        devices.sort_unstable();
        f.debug_struct("CredentialVault")
            .field("devices", &devices)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn master() -> SecretString {
        SecretString::from("correct horse battery staple")
    }

    #[test]
    fn test_round_trip() {
        let key = EncryptionKey::derive(&master(), b"0123456789abcdef");
        let sealed = key.encrypt("p@ss w0rd").unwrap();

        assert_eq!(sealed.as_bytes().len(), NONCE_LEN + "p@ss w0rd".len() + TAG_LEN);
        assert_eq!(key.decrypt(&sealed).unwrap().expose_secret(), "p@ss w0rd");

        // fresh nonce every time
        assert_ne!(key.encrypt("p@ss w0rd").unwrap(), sealed);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = EncryptionKey::derive(&master(), b"0123456789abcdef");
        let other = EncryptionKey::derive(&SecretString::from("wrong"), b"0123456789abcdef");
        let sealed = key.encrypt("secret").unwrap();

        assert_eq!(other.decrypt(&sealed).unwrap_err().kind(), ErrorKind::Credential);
    }

    #[test]
    fn test_tampered_blob_fails() {
        let key = EncryptionKey::derive(&master(), b"0123456789abcdef");
        let mut blob = key.encrypt("secret").unwrap().as_bytes().to_vec();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;

        let tampered = EncryptedPassword::from_bytes(blob).unwrap();
        assert_eq!(key.decrypt(&tampered).unwrap_err().kind(), ErrorKind::Credential);
        assert!(EncryptedPassword::from_bytes(vec![0; 8]).is_err());
        assert!(EncryptedPassword::from_base64("not base64!").is_err());
    }

    #[test]
    fn test_serialized_form_is_base64() {
        let key = EncryptionKey::derive(&master(), b"0123456789abcdef");
        let stored = StoredCredential {
            username: "admin".to_string(),
            password: key.encrypt("secret").unwrap(),
        };

        let json = serde_json::to_string(&stored).unwrap();
        assert!(json.contains(&stored.password.to_base64()));
        assert!(!json.contains("secret"));

        let back: StoredCredential = serde_json::from_str(&json).unwrap();
        assert_eq!(key.decrypt(&back.password).unwrap().expose_secret(), "secret");
    }

    #[test]
    fn test_vault_store_and_get() {
        let mut vault = CredentialVault::new(&master());
        assert_eq!(vault.salt().len(), SALT_LEN);

        vault
            .store_credentials("olt-01", "admin", &SecretString::from("hunter2"))
            .unwrap();
        assert!(vault.contains("olt-01"));

        let credentials = vault.get_credentials("olt-01").unwrap();
        assert_eq!(credentials.username, "admin");
        assert_eq!(credentials.password.expose_secret(), "hunter2");
        assert!(!format!("{:?}", credentials).contains("hunter2"));

        assert_eq!(
            vault.get_credentials("olt-02").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(vault.remove_credentials("olt-01"));
        assert!(!vault.remove_credentials("olt-01"));
        assert!(vault.is_empty());
    }

    #[test]
    fn test_persisted_salt_reopens_entries() {
        let mut vault = CredentialVault::new(&master());
        vault
            .store_credentials("olt-01", "admin", &SecretString::from("hunter2"))
            .unwrap();
        let stored = vault.get_encrypted("olt-01").unwrap().clone();

        let mut reopened = CredentialVault::with_salt(&master(), vault.salt());
        reopened.insert_encrypted("olt-01", stored);
        assert_eq!(
            reopened.get_credentials("olt-01").unwrap().password.expose_secret(),
            "hunter2"
        );
    }

    #[test]
    fn test_debug_is_redacted() {
        let mut vault = CredentialVault::with_salt(&master(), b"0123456789abcdef".to_vec());
        vault
            .store_credentials("olt-01", "admin", &SecretString::from("hunter2"))
            .unwrap();

        let debug = format!("{:?} {:?}", vault, vault.encryption_key());
        assert!(debug.contains("olt-01"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
