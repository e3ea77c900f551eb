//! Configuration commands.

use crate::config::{ClientConfig, CredentialOverrides};
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration.
///
/// Checks value ranges, then resolves the OAuth client and the vault key
/// when they are configured, so broken secret references show up here.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate()?;

    let google = &config.google;
    if google.client_id.is_some() || google.credentials_file.is_some() {
        let oauth = config.oauth_config(&CredentialOverrides::default())?;
        println!("Google OAuth client {} is valid.", oauth.client_id());
    } else {
        println!("No Google OAuth client in config (GOOGLE_CLIENT_ID or flags will be needed).");
    }

    if config.vault_key()?.is_some() {
        println!("Vault key resolves.");
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration and data file paths.
pub fn path(config: &ClientConfig) -> ClientResult<()> {
    println!("config: {}", ClientConfig::default_path().display());
    println!("tokens: {}", config.vault_path().display());
    if config.vault.key.is_none() {
        println!("key:    {}", config.key_file().display());
    }
    Ok(())
}
