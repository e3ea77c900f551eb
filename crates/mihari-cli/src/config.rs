//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/mihari/config.toml` by default.
//!
//! Credential and key values support secret references:
//! - `pass::path/in/store` resolved via `pass show`
//! - `env::VAR_NAME` resolved from the environment
//! - plain text used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use mihari_core::SearchQuery;
use mihari_gmail::{FetchFailurePolicy, OAuthClientConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::secret;

/// Configuration for the mihari client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// HTTP timeout in seconds for every provider round trip.
    pub timeout: u64,

    /// User id used when `--user` is not given.
    pub default_user: Option<String>,

    /// Google OAuth client settings.
    pub google: GoogleSettings,

    /// Local credential vault settings.
    pub vault: VaultSettings,

    /// Search defaults.
    pub search: SearchSettings,

    /// Browser linking settings.
    pub link: LinkSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            debug: false,
            timeout: OAuthClientConfig::DEFAULT_TIMEOUT_SECS,
            default_user: None,
            google: GoogleSettings::default(),
            vault: VaultSettings::default(),
            search: SearchSettings::default(),
            link: LinkSettings::default(),
        }
    }
}

/// Google OAuth client settings.
///
/// `client_id` and `client_secret` support secret references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID.
    pub client_id: Option<String>,

    /// OAuth client secret (only for confidential "web" clients).
    pub client_secret: Option<String>,

    /// Google Cloud Console credentials JSON, used when `client_id` is unset.
    pub credentials_file: Option<PathBuf>,
}

/// Local credential vault settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Encrypted token file. Defaults to `<data dir>/mihari/tokens.json`.
    pub path: Option<PathBuf>,

    /// Base64 AES-256 key (supports secret references). When unset, a key is
    /// generated once and kept in `key_file`.
    pub key: Option<String>,

    /// Key file. Defaults to `<data dir>/mihari/vault.key`.
    pub key_file: Option<PathBuf>,
}

/// Search defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Result cap when `--max` is not given.
    pub max_results: u32,

    /// Metadata fetches in flight at once.
    pub concurrency: usize,

    /// Return the results gathered before a failed fetch instead of failing.
    pub keep_partial: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: SearchQuery::DEFAULT_MAX_RESULTS,
            concurrency: 1,
            keep_partial: false,
        }
    }
}

impl SearchSettings {
    /// Returns the fetch failure policy selected by `keep_partial`.
    pub fn failure_policy(&self) -> FetchFailurePolicy {
        if self.keep_partial {
            FetchFailurePolicy::KeepPartial
        } else {
            FetchFailurePolicy::Abort
        }
    }
}

/// Browser linking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Inclusive loopback port range for the OAuth callback.
    pub port_range: (u16, u16),

    /// Seconds to wait for the browser redirect.
    pub callback_timeout: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port_range: (8765, 8775),
            callback_timeout: 300,
        }
    }
}

/// OAuth client values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    /// `--client-id` / `GOOGLE_CLIENT_ID`.
    pub client_id: Option<String>,
    /// `--client-secret` / `GOOGLE_CLIENT_SECRET`.
    pub client_secret: Option<String>,
    /// `--credentials-file`.
    pub credentials_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mihari")
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mihari")
    }

    /// Returns the encrypted token file path.
    pub fn vault_path(&self) -> PathBuf {
        self.vault
            .path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("tokens.json"))
    }

    /// Returns the vault key file path.
    pub fn key_file(&self) -> PathBuf {
        self.vault
            .key_file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("vault.key"))
    }

    /// Returns the inline vault key after secret resolution, if configured.
    pub fn vault_key(&self) -> ClientResult<Option<String>> {
        secret::resolve_opt(self.vault.key.as_deref())
            .map_err(|e| ClientError::Config(format!("failed to resolve vault key: {}", e)))
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> ClientResult<()> {
        if self.timeout == 0 {
            return Err(ClientError::Config("timeout must be positive".to_string()));
        }
        if !(1..=SearchQuery::PROVIDER_MAX_RESULTS).contains(&self.search.max_results) {
            return Err(ClientError::Config(format!(
                "search.max_results must be between 1 and {}",
                SearchQuery::PROVIDER_MAX_RESULTS
            )));
        }
        if self.search.concurrency == 0 {
            return Err(ClientError::Config(
                "search.concurrency must be at least 1".to_string(),
            ));
        }
        let (low, high) = self.link.port_range;
        if low == 0 || low > high {
            return Err(ClientError::Config(format!(
                "link.port_range {}-{} is not a valid range",
                low, high
            )));
        }
        Ok(())
    }

    /// Builds the OAuth client configuration.
    ///
    /// Priority (highest to lowest):
    /// 1. command-line `--client-id` (with optional `--client-secret`)
    /// 2. command-line `--credentials-file`
    /// 3. `[google] client_id` (with optional `client_secret`)
    /// 4. `[google] credentials_file`
    pub fn oauth_config(&self, overrides: &CredentialOverrides) -> ClientResult<OAuthClientConfig> {
        let config = if let Some(id) = overrides.client_id.as_deref() {
            debug!("using OAuth client from command line");
            with_secret(OAuthClientConfig::new(id)?, overrides.client_secret.clone())
        } else if let Some(path) = overrides.credentials_file.as_deref() {
            debug!(path = %path.display(), "using OAuth client from credentials file");
            OAuthClientConfig::from_file(path)?
        } else if let Some(raw_id) = self.google.client_id.as_deref() {
            debug!("using OAuth client from config.toml");
            let id = secret::resolve(raw_id)
                .map_err(|e| ClientError::Config(format!("failed to resolve client_id: {}", e)))?;
            let client_secret = secret::resolve_opt(self.google.client_secret.as_deref())
                .map_err(|e| {
                    ClientError::Config(format!("failed to resolve client_secret: {}", e))
                })?;
            with_secret(OAuthClientConfig::new(id)?, client_secret)
        } else if let Some(path) = self.google.credentials_file.as_deref() {
            OAuthClientConfig::from_file(path)?
        } else {
            return Err(ClientError::Config(format!(
                "Google OAuth client not configured. Add to {}:\n  \
                 [google]\n  \
                 client_id = \"YOUR_ID.apps.googleusercontent.com\"\n\n  \
                 or set GOOGLE_CLIENT_ID, or pass --credentials-file <path>",
                Self::default_path().display()
            )));
        };

        let config = config.with_timeout(Duration::from_secs(self.timeout));
        config.validate()?;
        Ok(config)
    }
}

fn with_secret(config: OAuthClientConfig, secret: Option<String>) -> OAuthClientConfig {
    match secret {
        Some(secret) if !secret.is_empty() => config.with_client_secret(secret),
        _ => config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.search.failure_policy(), FetchFailurePolicy::Abort);
    }

    #[test]
    fn parses_full_file() {
        let config: ClientConfig = toml::from_str(
            r#"
            timeout = 10
            default_user = "me"

            [google]
            client_id = "abc.apps.googleusercontent.com"

            [vault]
            path = "/tmp/mihari/tokens.json"
            key = "env::MIHARI_VAULT_KEY"

            [search]
            max_results = 25
            concurrency = 4
            keep_partial = true

            [link]
            port_range = [9000, 9010]
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout, 10);
        assert_eq!(config.default_user.as_deref(), Some("me"));
        assert_eq!(config.vault_path(), PathBuf::from("/tmp/mihari/tokens.json"));
        assert_eq!(config.search.concurrency, 4);
        assert_eq!(config.search.failure_policy(), FetchFailurePolicy::KeepPartial);
        assert_eq!(config.link.port_range, (9000, 9010));
        assert_eq!(config.link.callback_timeout, 300);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = ClientConfig::default();
        config.search.max_results = 501;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.link.port_range = (9000, 8000);
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.search.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn command_line_client_wins() {
        let mut config = ClientConfig::default();
        config.google.client_id = Some("config-id".to_string());

        let overrides = CredentialOverrides {
            client_id: Some("cli-id".to_string()),
            client_secret: Some("cli-secret".to_string()),
            credentials_file: None,
        };
        let oauth = config.oauth_config(&overrides).unwrap();
        assert_eq!(oauth.client_id(), "cli-id");
        assert_eq!(oauth.client_secret(), Some("cli-secret"));
    }

    #[test]
    fn config_client_resolves_secret_references() {
        unsafe {
            std::env::set_var("_MIHARI_TEST_CLIENT_ID", "env-id.apps.googleusercontent.com");
        }
        let mut config = ClientConfig::default();
        config.google.client_id = Some("env::_MIHARI_TEST_CLIENT_ID".to_string());
        config.timeout = 7;

        let oauth = config.oauth_config(&CredentialOverrides::default()).unwrap();
        assert_eq!(oauth.client_id(), "env-id.apps.googleusercontent.com");
        assert!(oauth.client_secret().is_none());
        assert_eq!(oauth.timeout(), Duration::from_secs(7));

        unsafe {
            std::env::remove_var("_MIHARI_TEST_CLIENT_ID");
        }
    }

    #[test]
    fn credentials_file_is_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("client.json");
        std::fs::write(
            &path,
            r#"{"installed": {"client_id": "file-id.apps.googleusercontent.com", "client_secret": "s"}}"#,
        )
        .unwrap();

        let overrides = CredentialOverrides {
            credentials_file: Some(path),
            ..Default::default()
        };
        let oauth = ClientConfig::default().oauth_config(&overrides).unwrap();
        assert_eq!(oauth.client_id(), "file-id.apps.googleusercontent.com");
        assert_eq!(oauth.client_secret(), Some("s"));
    }

    #[test]
    fn missing_client_is_config_error() {
        let err = ClientConfig::default()
            .oauth_config(&CredentialOverrides::default())
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn blank_client_id_is_rejected() {
        let overrides = CredentialOverrides {
            client_id: Some("   ".to_string()),
            ..Default::default()
        };
        let err = ClientConfig::default().oauth_config(&overrides).unwrap_err();
        match err {
            ClientError::Gmail(e) => {
                assert_eq!(e.code(), mihari_gmail::GmailErrorCode::ConfigurationError)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
