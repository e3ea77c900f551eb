//! `mihari token`: print a fresh access token.

use crate::config::{ClientConfig, CredentialOverrides};
use crate::error::ClientResult;

/// Refreshes and prints the access token of the selected user.
///
/// The token goes to stdout so it can be piped; the expiry goes to stderr.
pub async fn run(
    config: &ClientConfig,
    user: Option<String>,
    overrides: &CredentialOverrides,
) -> ClientResult<()> {
    let user_id = super::resolve_user(user, config)?;
    let service = super::open_service(config, overrides)?;

    let token = service.access_token(&user_id).await?;
    println!("{}", token.secret());
    if let Some(expires_at) = token.expires_at() {
        eprintln!("expires at {}", expires_at.to_rfc3339());
    }
    Ok(())
}
