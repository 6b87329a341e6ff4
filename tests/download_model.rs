mod common;

use common::{mount_model, TEST_API_KEY};
use std::fs;
use tripo_harvester::{HarvestError, TripoClient};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn test_download_model_success() {
    let server = MockServer::start().await;
    let url = mount_model(&server, "m.glb", "dummy model data").await;
    let client = TripoClient::new_with_url(TEST_API_KEY.to_string(), &server.uri()).unwrap();

    let staging = tempfile::tempdir().unwrap();
    let dest = staging.path().join("nested").join("model_2024-05-01.glb");

    let bytes = client.download_model(&url, &dest).await.unwrap();

    assert_eq!(bytes, "dummy model data".len() as u64);
    assert_eq!(fs::read_to_string(&dest).unwrap(), "dummy model data");

    // Model URLs are pre-signed; the API key must not leak to them.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_download_model_overwrites_stale_file() {
    let server = MockServer::start().await;
    let url = mount_model(&server, "m.glb", "fresh").await;
    let client = TripoClient::new_with_url(TEST_API_KEY.to_string(), &server.uri()).unwrap();

    let staging = tempfile::tempdir().unwrap();
    let dest = staging.path().join("model_2024-05-01.glb");
    fs::write(&dest, "stale bytes from an interrupted run").unwrap();

    client.download_model(&url, &dest).await.unwrap();

    assert_eq!(fs::read_to_string(&dest).unwrap(), "fresh");
}

#[tokio::test]
async fn test_download_model_larger_than_buffer() {
    let server = MockServer::start().await;
    let body = vec![7u8; tripo_harvester::DOWNLOAD_CHUNK_SIZE * 3 + 17];

    Mock::given(method("GET"))
        .and(path("/big.glb"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let client = TripoClient::new_with_url(TEST_API_KEY.to_string(), &server.uri()).unwrap();
    let staging = tempfile::tempdir().unwrap();
    let dest = staging.path().join("model_2024-05-02.glb");

    let bytes = client
        .download_model(&format!("{}/big.glb", server.uri()), &dest)
        .await
        .unwrap();

    assert_eq!(bytes, body.len() as u64);
    assert_eq!(fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn test_download_model_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/expired.glb"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = TripoClient::new_with_url(TEST_API_KEY.to_string(), &server.uri()).unwrap();
    let staging = tempfile::tempdir().unwrap();
    let dest = staging.path().join("model_2024-05-01.glb");

    let err = client
        .download_model(&format!("{}/expired.glb", server.uri()), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::ApiError { .. }));
    assert!(!dest.exists());
}
