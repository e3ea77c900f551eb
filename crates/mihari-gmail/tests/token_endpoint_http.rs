mod common;

use std::sync::Arc;

use common::XorCipher;
use mihari_gmail::{
    AccessToken, ErrorAudience, GmailErrorCode, GmailResult, GoogleTokenEndpoint,
    OAuthClientConfig, TokenCipher, TokenExchanger, TokenRefresher,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoint_for(server: &MockServer) -> Arc<GoogleTokenEndpoint> {
    let config = OAuthClientConfig::new("client-1")
        .unwrap()
        .with_endpoints(
            &format!("{}/auth", server.uri()),
            &format!("{}/token", server.uri()),
        )
        .unwrap();
    Arc::new(GoogleTokenEndpoint::new(config).unwrap())
}

async fn token_reply(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(template)
        .mount(server)
        .await;
}

fn refresher_for(server: &MockServer) -> TokenRefresher {
    TokenRefresher::new(Arc::new(XorCipher(0x2a)), endpoint_for(server))
}

async fn refresh(server: &MockServer) -> GmailResult<AccessToken> {
    let blob = XorCipher(0x2a).encrypt("stored-refresh").unwrap();
    refresher_for(server).get_access_token(&blob).await
}

#[tokio::test]
async fn refresh_posts_form_and_reads_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=stored-refresh"))
        .and(body_string_contains("client_id=client-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.fresh",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = refresh(&server).await.unwrap();
    assert_eq!(token.secret(), "ya29.fresh");
    assert!(token.expires_at().is_some());
}

#[tokio::test]
async fn invalid_grant_becomes_refresh_failure() {
    let server = MockServer::start().await;
    token_reply(
        &server,
        ResponseTemplate::new(400).set_body_string(
            r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        ),
    )
    .await;

    let err = refresh(&server).await.unwrap_err();
    assert_eq!(err.code(), GmailErrorCode::TokenRefreshFailed);
    assert!(err.requires_relink());

    let cause = err.cause().unwrap();
    assert_eq!(cause.code(), GmailErrorCode::AuthenticationFailed);
    assert!(cause.message().contains("invalid_grant"));
}

#[tokio::test]
async fn rejected_client_is_configuration_error() {
    for (status, error) in [(401_u16, "invalid_client"), (400, "unauthorized_client")] {
        let server = MockServer::start().await;
        token_reply(
            &server,
            ResponseTemplate::new(status).set_body_string(format!(r#"{{"error":"{error}"}}"#)),
        )
        .await;

        let err = refresh(&server).await.unwrap_err();
        assert_eq!(err.code(), GmailErrorCode::ConfigurationError, "{error}");
        assert!(!err.requires_relink());
        assert_eq!(err.audience(), ErrorAudience::Operator);
    }
}

#[tokio::test]
async fn throttling_and_server_errors_stay_retryable() {
    for (status, code) in [
        (429_u16, GmailErrorCode::RateLimited),
        (500, GmailErrorCode::ServerError),
        (503, GmailErrorCode::ServerError),
    ] {
        let server = MockServer::start().await;
        token_reply(&server, ResponseTemplate::new(status).set_body_string("busy")).await;

        let err = refresh(&server).await.unwrap_err();
        assert_eq!(err.code(), code, "status {status}");
        assert!(err.is_retryable());
        assert!(!err.requires_relink());
    }
}

#[tokio::test]
async fn malformed_success_body_is_invalid_response() {
    let server = MockServer::start().await;
    token_reply(&server, ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;

    let err = refresh(&server).await.unwrap_err();
    assert_eq!(err.code(), GmailErrorCode::InvalidResponse);
}

#[tokio::test]
async fn exchange_sends_verifier_and_keeps_rejection_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=good-code"))
        .and(body_string_contains("code_verifier=v-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.first",
            "refresh_token": "long-lived",
            "expires_in": 3599
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=bad-code"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
        )
        .mount(&server)
        .await;

    let exchanger = TokenExchanger::new(endpoint_for(&server));
    let bundle = exchanger
        .exchange_with_verifier("good-code", "http://127.0.0.1:8765/callback", "v-123")
        .await
        .unwrap();
    assert_eq!(bundle.refresh_token, "long-lived");
    assert_eq!(bundle.access_token, "ya29.first");

    let err = exchanger
        .exchange("bad-code", "http://127.0.0.1:8765/callback")
        .await
        .unwrap_err();
    assert_eq!(err.code(), GmailErrorCode::AuthenticationFailed);
}
