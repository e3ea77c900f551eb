//! `mihari link`: browser consent with PKCE over a loopback redirect.

use std::sync::Arc;
use std::time::Duration;

use mihari_gmail::{BlobStore, GmailService, PkceFlow};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ClientConfig, CredentialOverrides};
use crate::error::{ClientError, ClientResult};
use crate::loopback::LoopbackServer;
use crate::vault;

/// Runs the linking flow and stores the encrypted refresh token.
pub async fn run(
    config: &ClientConfig,
    user: Option<String>,
    force: bool,
    no_browser: bool,
    overrides: &CredentialOverrides,
) -> ClientResult<()> {
    let oauth = config.oauth_config(overrides)?;
    let store = super::open_store(config);

    let (user_id, generated) = match super::pick_user(user, config) {
        Some(user_id) => (user_id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    if !force && store.get(&user_id)?.is_some() {
        println!("User {} is already linked.", user_id);
        println!("Use --force to link again.");
        return Ok(());
    }

    let cipher = Arc::new(vault::load_cipher(config)?);
    let service = GmailService::from_config(oauth.clone(), cipher, store)?;

    let server = LoopbackServer::bind(config.link.port_range)?;
    let redirect_uri = server.redirect_uri();
    let pkce = PkceFlow::new();
    let auth_url = pkce.build_auth_url(&oauth, &redirect_uri);
    debug!(%redirect_uri, "starting consent flow");

    if no_browser {
        println!("Open this URL in your browser:\n\n{}\n", auth_url);
    } else {
        println!("A browser window will open for you to grant read-only Gmail access.");
        if let Err(e) = open::that(&auth_url) {
            warn!(error = %e, "failed to open browser");
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }
    }

    let timeout = Duration::from_secs(config.link.callback_timeout);
    let callback = tokio::task::spawn_blocking(move || server.wait(timeout))
        .await
        .map_err(|e| ClientError::Authorization(format!("callback task failed: {}", e)))??;

    if callback.state != pkce.state {
        return Err(ClientError::Authorization(
            "state mismatch on redirect, refusing the authorization code".to_string(),
        ));
    }

    let bundle = service
        .link_account(&user_id, &callback.code, &redirect_uri, Some(&pkce.verifier))
        .await?;

    info!(user_id, expires_at = %bundle.expires_at, "account linked");
    println!();
    println!("Gmail account linked for user {}.", user_id);
    if generated {
        println!();
        println!("This user id was generated. Keep it, or add it to config.toml:");
        println!("  default_user = \"{}\"", user_id);
    }
    Ok(())
}
