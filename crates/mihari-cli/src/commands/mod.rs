//! Subcommand implementations.

pub mod config;
pub mod link;
pub mod search;
pub mod token;
pub mod unlink;

use std::sync::Arc;

use mihari_gmail::GmailService;

use crate::config::{ClientConfig, CredentialOverrides};
use crate::error::{ClientError, ClientResult};
use crate::vault::{self, FileBlobStore};

/// Picks the user id from `--user`, falling back to `default_user`.
/// Blank ids count as absent.
pub(crate) fn pick_user(user: Option<String>, config: &ClientConfig) -> Option<String> {
    user.or_else(|| config.default_user.clone())
        .filter(|u| !u.trim().is_empty())
}

/// Like [`pick_user`], but a missing id is an error.
pub(crate) fn resolve_user(user: Option<String>, config: &ClientConfig) -> ClientResult<String> {
    pick_user(user, config).ok_or_else(|| {
        ClientError::Config(
            "no user given; pass --user or set default_user in config.toml".to_string(),
        )
    })
}

/// Opens the file-backed token store configured in `config`.
pub(crate) fn open_store(config: &ClientConfig) -> Arc<FileBlobStore> {
    Arc::new(FileBlobStore::new(config.vault_path()))
}

/// Builds a [`GmailService`] over the local vault.
pub(crate) fn open_service(
    config: &ClientConfig,
    overrides: &CredentialOverrides,
) -> ClientResult<GmailService> {
    let oauth = config.oauth_config(overrides)?;
    let cipher = Arc::new(vault::load_cipher(config)?);
    let service = GmailService::from_config(oauth, cipher, open_store(config))?
        .with_concurrency(config.search.concurrency)
        .with_failure_policy(config.search.failure_policy());
    Ok(service)
}
