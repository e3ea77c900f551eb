use std::sync::Arc;

use mihari_gmail::{
    GmailClient, GmailErrorCode, MailboxApi, MessageRef, MessageSearcher, SearchQuery,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GmailClient {
    GmailClient::with_http_client(reqwest::Client::new())
        .with_base_url(format!("{}/gmail/v1", server.uri()))
}

async fn list_reply(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn list_sends_query_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("q", "invoice"))
        .and(query_param("maxResults", "5"))
        .and(header("authorization", "Bearer ya29.token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messages": [{"id": "A", "threadId": "TA"}, {"id": "B", "threadId": "TB"}],
            "resultSizeEstimate": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refs = client_for(&server)
        .list_messages("ya29.token", "invoice", 5)
        .await
        .unwrap();
    assert_eq!(refs, vec![MessageRef::new("A", "TA"), MessageRef::new("B", "TB")]);
}

#[tokio::test]
async fn metadata_requests_named_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages/A"))
        .and(query_param("format", "metadata"))
        .and(query_param("metadataHeaders", "Subject"))
        .and(query_param("metadataHeaders", "From"))
        .and(query_param("metadataHeaders", "Date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "A",
            "snippet": "Your invoice is attached",
            "payload": {"headers": [{"name": "subject", "value": "Invoice #42"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = client_for(&server)
        .get_message_metadata("t", "A", &["Subject", "From", "Date"])
        .await
        .unwrap();
    assert_eq!(metadata.snippet.as_deref(), Some("Your invoice is attached"));
    assert_eq!(metadata.headers().len(), 1);
}

#[tokio::test]
async fn status_codes_map_to_error_codes() {
    for (status, code) in [
        (401_u16, GmailErrorCode::AuthenticationFailed),
        (403, GmailErrorCode::AuthorizationFailed),
        (404, GmailErrorCode::NotFound),
        (400, GmailErrorCode::BadRequest),
        (500, GmailErrorCode::ServerError),
        (503, GmailErrorCode::ServerError),
    ] {
        let server = MockServer::start().await;
        list_reply(&server, ResponseTemplate::new(status).set_body_string("nope")).await;

        let err = client_for(&server)
            .list_messages("t", "x", 10)
            .await
            .unwrap_err();
        assert_eq!(err.code(), code, "status {status}");
    }
}

#[tokio::test]
async fn rate_limit_reports_retry_after() {
    let server = MockServer::start().await;
    list_reply(
        &server,
        ResponseTemplate::new(429).insert_header("Retry-After", "30"),
    )
    .await;

    let err = client_for(&server)
        .list_messages("t", "x", 10)
        .await
        .unwrap_err();
    assert_eq!(err.code(), GmailErrorCode::RateLimited);
    assert!(err.is_retryable());
    assert!(err.message().contains("retry after 30 seconds"));
}

#[tokio::test]
async fn non_json_body_is_invalid_response() {
    let server = MockServer::start().await;
    list_reply(&server, ResponseTemplate::new(200).set_body_string("<html></html>")).await;

    let err = client_for(&server)
        .list_messages("t", "x", 10)
        .await
        .unwrap_err();
    assert_eq!(err.code(), GmailErrorCode::InvalidResponse);
}

#[tokio::test]
async fn missing_message_aborts_search() {
    let server = MockServer::start().await;
    list_reply(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messages": [{"id": "A", "threadId": "TA"}, {"id": "B", "threadId": "TB"}]
        })),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages/A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "snippet": "first"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages/B"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let api: Arc<dyn MailboxApi> = Arc::new(client_for(&server));
    let err = MessageSearcher::new(api)
        .search("t", &SearchQuery::new("x"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), GmailErrorCode::SearchFetchFailed);
    assert_eq!(err.cause().unwrap().code(), GmailErrorCode::NotFound);
}
