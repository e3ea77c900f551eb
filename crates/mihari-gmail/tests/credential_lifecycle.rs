mod common;

use std::sync::Arc;

use common::{FakeMailbox, ScriptedEndpoint, XorCipher};
use mihari_gmail::{
    BlobStore, EncryptedToken, GmailErrorCode, GmailService, MailboxApi, MemoryBlobStore,
    SearchQuery, TokenCipher, TokenEndpoint, TokenExchanger, TokenGrant, TokenRefresher,
};

const REDIRECT: &str = "http://127.0.0.1:8765/callback";

struct Harness {
    endpoint: Arc<ScriptedEndpoint>,
    store: Arc<MemoryBlobStore>,
    mailbox: Arc<FakeMailbox>,
    service: GmailService,
}

fn harness(endpoint: ScriptedEndpoint, mailbox: FakeMailbox) -> Harness {
    let endpoint = Arc::new(endpoint);
    let store = Arc::new(MemoryBlobStore::new());
    let mailbox = Arc::new(mailbox);
    let service = GmailService::new(
        Arc::new(XorCipher(0x5a)),
        store.clone() as Arc<dyn BlobStore>,
        endpoint.clone() as Arc<dyn TokenEndpoint>,
        mailbox.clone() as Arc<dyn MailboxApi>,
    );
    Harness {
        endpoint,
        store,
        mailbox,
        service,
    }
}

#[tokio::test]
async fn exchange_yields_non_empty_refresh_token() {
    let endpoint = Arc::new(ScriptedEndpoint::new().then_ok(Some("a"), Some("1//r"), Some(3600)));
    let bundle = TokenExchanger::new(endpoint)
        .exchange("4/code", REDIRECT)
        .await
        .unwrap();
    assert!(!bundle.refresh_token.is_empty());
}

#[tokio::test]
async fn exchange_without_refresh_token_has_no_bundle() {
    let endpoint = Arc::new(ScriptedEndpoint::new().then_ok(Some("a"), None, Some(3600)));
    let result = TokenExchanger::new(endpoint).exchange("4/code", REDIRECT).await;
    assert_eq!(
        result.unwrap_err().code(),
        GmailErrorCode::RefreshTokenMissing
    );
}

#[tokio::test]
async fn undecryptable_blobs_never_reach_the_network() {
    let endpoint = Arc::new(ScriptedEndpoint::new().then_ok(Some("a"), None, None));
    let refresher = TokenRefresher::new(Arc::new(XorCipher(1)), endpoint.clone());

    for blob in ["abc", "zz", "ff00ff"] {
        let err = refresher
            .get_access_token(&EncryptedToken::new(blob))
            .await
            .unwrap_err();
        assert_eq!(err.code(), GmailErrorCode::DecryptionFailed, "blob {blob}");
    }
    assert_eq!(endpoint.calls(), 0);
}

#[tokio::test]
async fn link_stores_only_the_encrypted_refresh_token() {
    let h = harness(
        ScriptedEndpoint::new().then_ok(Some("ya29.first"), Some("1//refresh"), Some(3600)),
        FakeMailbox::new(),
    );

    let bundle = h
        .service
        .link_account("user-1", "4/code", REDIRECT, Some("verifier"))
        .await
        .unwrap();
    assert_eq!(bundle.refresh_token, "1//refresh");

    let stored = h.store.get("user-1").unwrap().unwrap();
    assert_ne!(stored.as_str(), "1//refresh");
    assert_eq!(XorCipher(0x5a).decrypt(&stored).unwrap(), "1//refresh");
    assert!(h.service.is_linked("user-1").unwrap());
}

#[tokio::test]
async fn access_token_is_cached_after_link() {
    let h = harness(
        ScriptedEndpoint::new().then_ok(Some("ya29.first"), Some("1//refresh"), Some(3600)),
        FakeMailbox::new(),
    );
    h.service
        .link_account("user-1", "4/code", REDIRECT, None)
        .await
        .unwrap();

    let token = h.service.access_token("user-1").await.unwrap();
    assert_eq!(token.secret(), "ya29.first");
    assert_eq!(h.endpoint.calls(), 1);
}

#[tokio::test]
async fn near_expiry_token_is_refreshed_once() {
    let h = harness(
        ScriptedEndpoint::new()
            .then_ok(Some("ya29.short"), Some("1//refresh"), Some(30))
            .then_ok(Some("ya29.renewed"), None, Some(3600)),
        FakeMailbox::new(),
    );
    h.service
        .link_account("user-1", "4/code", REDIRECT, None)
        .await
        .unwrap();

    let first = h.service.access_token("user-1").await.unwrap();
    let second = h.service.access_token("user-1").await.unwrap();
    assert_eq!(first.secret(), "ya29.renewed");
    assert_eq!(second.secret(), "ya29.renewed");
    assert_eq!(h.endpoint.calls(), 2);

    let grants = h.endpoint.grants.lock().unwrap();
    assert_eq!(
        grants[1],
        TokenGrant::RefreshToken {
            refresh_token: "1//refresh".to_string()
        }
    );
}

#[tokio::test]
async fn unknown_user_is_not_linked() {
    let h = harness(ScriptedEndpoint::new(), FakeMailbox::new());
    let err = h.service.access_token("nobody").await.unwrap_err();
    assert_eq!(err.code(), GmailErrorCode::NotLinked);
    assert!(err.requires_relink());
    assert_eq!(h.endpoint.calls(), 0);
}

#[tokio::test]
async fn revoked_consent_asks_for_relink() {
    let h = harness(
        ScriptedEndpoint::new().then_err(GmailErrorCode::AuthenticationFailed),
        FakeMailbox::new(),
    );
    let blob = XorCipher(0x5a).encrypt("1//revoked").unwrap();
    h.store.put("user-1", blob).unwrap();

    let err = h
        .service
        .search("user-1", &SearchQuery::new("invoice"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), GmailErrorCode::TokenRefreshFailed);
    assert_eq!(err.user_message(), "Please re-link your Gmail account.");
}

#[tokio::test]
async fn search_uses_the_linked_token() {
    let h = harness(
        ScriptedEndpoint::new().then_ok(Some("ya29.first"), Some("1//refresh"), Some(3600)),
        FakeMailbox::new().message("A", "Please pay...", &[("Subject", "Invoice #1")]),
    );
    h.service
        .link_account("user-1", "4/code", REDIRECT, None)
        .await
        .unwrap();

    let results = h
        .service
        .search("user-1", &SearchQuery::new("invoice"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].subject, "Invoice #1");

    let list_calls = h.mailbox.list_calls.lock().unwrap();
    assert_eq!(list_calls[0].0, "ya29.first");
    assert_eq!(list_calls[0].2, 10);
}

#[tokio::test]
async fn rejected_access_token_is_evicted() {
    let h = harness(
        ScriptedEndpoint::new()
            .then_ok(Some("ya29.first"), Some("1//refresh"), Some(3600))
            .then_ok(Some("ya29.second"), None, Some(3600)),
        FakeMailbox::new().fail_listing(GmailErrorCode::AuthenticationFailed),
    );
    h.service
        .link_account("user-1", "4/code", REDIRECT, None)
        .await
        .unwrap();

    let err = h
        .service
        .search("user-1", &SearchQuery::new("x"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), GmailErrorCode::AuthenticationFailed);

    let token = h.service.access_token("user-1").await.unwrap();
    assert_eq!(token.secret(), "ya29.second");
}

#[tokio::test]
async fn unlink_removes_credential_and_cache() {
    let h = harness(
        ScriptedEndpoint::new().then_ok(Some("ya29.first"), Some("1//refresh"), Some(3600)),
        FakeMailbox::new(),
    );
    h.service
        .link_account("user-1", "4/code", REDIRECT, None)
        .await
        .unwrap();

    assert!(h.service.unlink("user-1").await.unwrap());
    assert!(!h.service.unlink("user-1").await.unwrap());
    assert!(h.store.is_empty());

    let err = h.service.access_token("user-1").await.unwrap_err();
    assert_eq!(err.code(), GmailErrorCode::NotLinked);
}
