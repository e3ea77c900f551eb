//! `mihari unlink`: forget a user's stored credential.

use mihari_gmail::BlobStore;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Removes the encrypted refresh token of the selected user.
///
/// Works without an OAuth client configuration. Access already granted on
/// the Google side stays valid until revoked in the account settings.
pub fn run(config: &ClientConfig, user: Option<String>) -> ClientResult<()> {
    let user_id = super::resolve_user(user, config)?;
    let store = super::open_store(config);

    if store.remove(&user_id)? {
        info!(user_id, "credential removed");
        println!("Unlinked user {}.", user_id);
    } else {
        println!("User {} was not linked.", user_id);
    }
    Ok(())
}
