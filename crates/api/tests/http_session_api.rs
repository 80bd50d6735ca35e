use std::time::Duration;

use api::{ApiConfig, CreateSessionRequest, HttpSessionApi, RetryPolicy, SessionApi, with_retry};
use reqwest::StatusCode;
use serde_json::json;
use tracking_core::model::{AttemptRecord, SessionContext, SessionDelta, SessionId};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> HttpSessionApi {
    let config = ApiConfig::new(&server.uri())
        .expect("valid base url")
        .with_csrf_token("token-1");
    HttpSessionApi::new(config).expect("build client")
}

#[tokio::test]
async fn create_session_posts_to_collection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/logger/trackprogress/"))
        .and(header("X-CSRFToken", "token-1"))
        .and(body_json(json!({
            "node_id": "n1",
            "content_id": "c1",
            "channel_id": "ch1",
            "kind": "video",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s1",
            "context": { "node_id": "n1" },
            "complete": false,
            "progress": 0.5,
            "time_spent": 30,
            "extra_fields": { "contentState": { "page": 2 } },
            "mastery_criterion": null,
            "pastattempts": [],
            "totalattempts": 0,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = CreateSessionRequest {
        node_id: Some("n1".into()),
        content_id: Some("c1".into()),
        channel_id: Some("ch1".into()),
        kind: Some("video".into()),
        ..CreateSessionRequest::default()
    };
    let response = api_for(&server)
        .create_session(&request)
        .await
        .expect("create session");

    assert_eq!(response.session_id, SessionId::new("s1"));
    assert_eq!(response.context, Some(SessionContext::node("n1", None)));
    assert_eq!(response.progress, 0.5);
    assert_eq!(response.time_spent, 30.0);
}

#[tokio::test]
async fn update_session_puts_only_present_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/logger/trackprogress/s1/"))
        .and(body_json(json!({
            "progress_delta": 0.25,
            "interactions": [{ "item": "q1", "correct": 1.0 }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "complete": false,
            "attempts": [{ "id": "a1", "item": "q1", "correct": 1 }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let delta = SessionDelta {
        progress_delta: Some(0.25),
        interactions: vec![AttemptRecord::for_item("q1").with_correct(1.0)],
        ..SessionDelta::default()
    };
    let response = api_for(&server)
        .update_session(&SessionId::new("s1"), &delta)
        .await
        .expect("update session");

    assert!(!response.complete);
    assert_eq!(response.attempts.len(), 1);
    assert_eq!(
        response.attempts[0].id.as_ref().map(|id| id.as_str()),
        Some("a1")
    );
}

#[tokio::test]
async fn unavailable_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "2"))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .update_session(&SessionId::new("s1"), &SessionDelta::default())
        .await
        .unwrap_err();

    assert!(err.is_unavailable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn oversized_retry_after_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "1e20"))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .update_session(&SessionId::new("s1"), &SessionDelta::default())
        .await
        .unwrap_err();

    assert!(err.is_unavailable());
    assert_eq!(err.retry_after(), None);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let api = &api_for(&server);
    let session_id = &SessionId::new("s1");
    let delta = &SessionDelta::default();
    let err = with_retry(&RetryPolicy::default(), move || {
        api.update_session(session_id, delta)
    })
    .await
    .unwrap_err();

    assert_eq!(err.status_code(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .create_session(&CreateSessionRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, api::ApiError::Decode(_)));
}
