//! Credential vault interfaces.
//!
//! Refresh tokens are kept at rest as opaque encrypted blobs, one per user.
//! The core never picks an encryption scheme or a storage backend: it consumes
//! a [`TokenCipher`] for encrypt/decrypt and a [`BlobStore`] for get/put by
//! user id. [`MemoryBlobStore`] is a ready-made in-process store.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GmailError, GmailResult};

/// An encrypted refresh token as stored by the vault.
///
/// The content is opaque to the core; only the cipher that produced it can
/// turn it back into a token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedToken(String);

impl EncryptedToken {
    /// Wraps an encrypted blob.
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    /// Returns the raw blob.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the raw blob.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for EncryptedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedToken({} bytes)", self.0.len())
    }
}

/// Encrypts and decrypts refresh tokens.
///
/// Implementations report failures as [`GmailError`]; a failed `decrypt`
/// should use [`GmailError::decryption`] so callers can tell local corruption
/// apart from revoked consent.
pub trait TokenCipher: Send + Sync {
    /// Encrypts a plaintext refresh token.
    fn encrypt(&self, plaintext: &str) -> GmailResult<EncryptedToken>;

    /// Decrypts a stored blob back to the plaintext refresh token.
    fn decrypt(&self, blob: &EncryptedToken) -> GmailResult<String>;
}

/// Stores one encrypted token per user id.
pub trait BlobStore: Send + Sync {
    /// Returns the blob stored for `user_id`, if any.
    fn get(&self, user_id: &str) -> GmailResult<Option<EncryptedToken>>;

    /// Stores (or replaces) the blob for `user_id`.
    fn put(&self, user_id: &str, blob: EncryptedToken) -> GmailResult<()>;

    /// Removes the blob for `user_id`. Returns true if one was present.
    fn remove(&self, user_id: &str) -> GmailResult<bool>;
}

/// In-memory [`BlobStore`].
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, EncryptedToken>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> GmailError {
    GmailError::storage("blob store lock poisoned")
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, user_id: &str) -> GmailResult<Option<EncryptedToken>> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        Ok(blobs.get(user_id).cloned())
    }

    fn put(&self, user_id: &str, blob: EncryptedToken) -> GmailResult<()> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        blobs.insert(user_id.to_string(), blob);
        debug!(user_id, "stored encrypted refresh token");
        Ok(())
    }

    fn remove(&self, user_id: &str) -> GmailResult<bool> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        Ok(blobs.remove(user_id).is_some())
    }
}
