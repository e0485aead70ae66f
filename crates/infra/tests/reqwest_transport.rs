//! ReqwestTransport against a local mock HTTP server.

use std::time::Duration;

use mockito::Matcher;
use serde_json::json;

use personaforge_infra::external::{
    HttpMethod, PayloadFile, ProviderRequest, ProviderTransport, ReqwestTransport, RequestBody,
};
use personaforge_providers::AuthStyle;

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(5)).unwrap()
}

fn request(method: HttpMethod, url: String, auth: AuthStyle, body: RequestBody) -> ProviderRequest {
    ProviderRequest {
        method,
        url,
        auth,
        api_key: Some("sk-test".to_string()),
        body,
    }
}

#[tokio::test]
async fn header_auth_and_json_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v2/video/generate")
        .match_header("x-api-key", "sk-test")
        .match_body(Matcher::Json(json!({"script": "hello"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":{"video_id":"v-1"}}"#)
        .create_async()
        .await;

    let response = transport()
        .send(request(
            HttpMethod::Post,
            format!("{}/v2/video/generate", server.url()),
            AuthStyle::header("x-api-key"),
            RequestBody::Json(json!({"script": "hello"})),
        ))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 200);
    assert!(response.body.contains("v-1"));
}

#[tokio::test]
async fn bearer_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/videos/v-1")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_body(r#"{"status":"processing"}"#)
        .create_async()
        .await;

    let response = transport()
        .send(request(
            HttpMethod::Get,
            format!("{}/v2/videos/v-1", server.url()),
            AuthStyle::Bearer,
            RequestBody::Empty,
        ))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(response.is_success());
}

#[tokio::test]
async fn query_auth_keeps_existing_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/video_status.get")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("video_id".into(), "v-9".into()),
            Matcher::UrlEncoded("apiKey".into(), "sk-test".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"status":"done"}"#)
        .create_async()
        .await;

    transport()
        .send(request(
            HttpMethod::Get,
            format!("{}/v1/video_status.get?video_id=v-9", server.url()),
            AuthStyle::query("apiKey"),
            RequestBody::Empty,
        ))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_statuses_are_returned_not_raised() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/voices/add")
        .with_status(429)
        .with_body("quota exceeded")
        .create_async()
        .await;

    let response = transport()
        .send(request(
            HttpMethod::Post,
            format!("{}/v1/voices/add", server.url()),
            AuthStyle::header("xi-api-key"),
            RequestBody::Empty,
        ))
        .await
        .unwrap();

    assert_eq!(response.status, 429);
    assert_eq!(response.body, "quota exceeded");
}

#[tokio::test]
async fn files_are_sent_as_multipart() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/voices/add")
        .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="name""#.into()),
            Matcher::Regex(r#"filename="sample.mp3""#.into()),
        ]))
        .with_status(200)
        .with_body(r#"{"voice_id":"vc-1"}"#)
        .create_async()
        .await;

    transport()
        .send(request(
            HttpMethod::Post,
            format!("{}/v1/voices/add", server.url()),
            AuthStyle::header("xi-api-key"),
            RequestBody::Multipart {
                fields: vec![("name".to_string(), "Ada".to_string())],
                files: vec![PayloadFile {
                    field: "files".to_string(),
                    filename: "sample.mp3".to_string(),
                    content_type: Some("audio/mpeg".to_string()),
                    bytes: b"ID3fake".to_vec(),
                }],
            },
        ))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let err = transport()
        .send(request(
            HttpMethod::Get,
            "http://127.0.0.1:1/status".to_string(),
            AuthStyle::Bearer,
            RequestBody::Empty,
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        personaforge_infra::external::TransportError::Network(_)
            | personaforge_infra::external::TransportError::Timeout
    ));
}
