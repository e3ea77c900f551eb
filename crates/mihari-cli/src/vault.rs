//! Local credential vault.
//!
//! Refresh tokens are encrypted with AES-256-GCM ([`AesGcmCipher`]) and kept
//! in a JSON file mapping user ids to blobs ([`FileBlobStore`]). Each blob is
//! `base64(nonce || ciphertext+tag)`.
//!
//! The token file and the key file are written atomically (temp file, then
//! rename) and restricted to the owner on Unix.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mihari_gmail::{BlobStore, EncryptedToken, GmailError, GmailResult, TokenCipher};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// AES-256-GCM nonce size (96 bits).
const NONCE_SIZE: usize = 12;
/// AES-256 key size (256 bits).
const KEY_SIZE: usize = 32;

/// [`TokenCipher`] backed by AES-256-GCM.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesGcmCipher")
    }
}

impl AesGcmCipher {
    /// Creates a cipher from raw key bytes.
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Creates a cipher from a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> ClientResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ClientError::Vault(format!("vault key is not valid base64: {}", e)))?;
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            ClientError::Vault(format!(
                "vault key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self::new(&key))
    }

    /// Generates a fresh random key, base64-encoded.
    pub fn generate_key() -> String {
        STANDARD.encode(Aes256Gcm::generate_key(&mut OsRng))
    }
}

impl TokenCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> GmailResult<EncryptedToken> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| GmailError::internal("token encryption failed"))?;

        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);
        Ok(EncryptedToken::new(STANDARD.encode(output)))
    }

    fn decrypt(&self, blob: &EncryptedToken) -> GmailResult<String> {
        let data = STANDARD
            .decode(blob.as_str())
            .map_err(|e| GmailError::decryption("blob is not valid base64").with_source(e))?;
        if data.len() < NONCE_SIZE {
            return Err(GmailError::decryption("blob is too short"));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| GmailError::decryption("blob failed authentication"))?;

        String::from_utf8(plaintext)
            .map_err(|e| GmailError::decryption("plaintext is not UTF-8").with_source(e))
    }
}

/// Loads the vault key: the configured key if any, otherwise the key file,
/// which is created with a random key on first use.
pub fn load_cipher(config: &ClientConfig) -> ClientResult<AesGcmCipher> {
    if let Some(key) = config.vault_key()? {
        debug!("using vault key from config");
        return AesGcmCipher::from_base64(&key);
    }

    let path = config.key_file();
    if path.exists() {
        let key = fs::read_to_string(&path).map_err(|e| {
            ClientError::Vault(format!("failed to read key file {}: {}", path.display(), e))
        })?;
        return AesGcmCipher::from_base64(&key);
    }

    let key = AesGcmCipher::generate_key();
    write_private(&path, key.as_bytes())?;
    info!(path = %path.display(), "generated new vault key");
    AesGcmCipher::from_base64(&key)
}

/// [`BlobStore`] persisted as a JSON object `{ user_id: blob }`.
#[derive(Debug)]
pub struct FileBlobStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBlobStore {
    /// Creates a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> GmailResult<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| GmailError::storage("token file lock poisoned"))
    }

    fn read_all(&self) -> GmailResult<BTreeMap<String, EncryptedToken>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            GmailError::storage(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            GmailError::storage(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn write_all(&self, blobs: &BTreeMap<String, EncryptedToken>) -> GmailResult<()> {
        let content = serde_json::to_string_pretty(blobs)
            .map_err(|e| GmailError::internal(format!("failed to serialize tokens: {}", e)))?;
        write_private(&self.path, content.as_bytes())
            .map_err(|e| GmailError::storage(e.to_string()))?;
        debug!(path = %self.path.display(), count = blobs.len(), "saved token file");
        Ok(())
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, user_id: &str) -> GmailResult<Option<EncryptedToken>> {
        let _guard = self.guard()?;
        Ok(self.read_all()?.remove(user_id))
    }

    fn put(&self, user_id: &str, blob: EncryptedToken) -> GmailResult<()> {
        let _guard = self.guard()?;
        let mut blobs = self.read_all()?;
        blobs.insert(user_id.to_string(), blob);
        self.write_all(&blobs)
    }

    fn remove(&self, user_id: &str) -> GmailResult<bool> {
        let _guard = self.guard()?;
        let mut blobs = self.read_all()?;
        if blobs.remove(user_id).is_none() {
            return Ok(false);
        }
        self.write_all(&blobs)?;
        Ok(true)
    }
}

/// Writes `content` to `path` via a temp file and rename, owner-only on Unix.
fn write_private(path: &Path, content: &[u8]) -> ClientResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ClientError::Vault(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(|e| {
        ClientError::Vault(format!("failed to write {}: {}", temp_path.display(), e))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
            ClientError::Vault(format!("failed to restrict {}: {}", temp_path.display(), e))
        })?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        ClientError::Vault(format!("failed to rename {}: {}", temp_path.display(), e))
    })
}
