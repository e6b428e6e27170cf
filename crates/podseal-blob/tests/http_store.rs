//! HttpBlobStore against a mock publisher and aggregator.

use std::time::Duration;

use podseal_blob::{BlobError, BlobStore, HttpBlobStore, PutOptions, RetryPolicy};
use podseal_core::ContentId;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer) -> HttpBlobStore {
    HttpBlobStore::new(&server.uri(), &server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_put_sends_storage_options() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/blobs"))
        .and(query_param("epochs", "3"))
        .and(query_param("deletable", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "newlyCreated": { "blobObject": { "blobId": "blob123", "size": 4 } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stored = store(&server)
        .put(
            b"data".to_vec(),
            PutOptions {
                epochs: 3,
                deletable: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(stored.content_id, ContentId::new("blob123"));
    assert_eq!(stored.url, format!("{}/v1/blobs/blob123", server.uri()));
}

#[tokio::test]
async fn test_put_accepts_already_certified() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "alreadyCertified": { "blobId": "existing" }
        })))
        .mount(&server)
        .await;

    let stored = store(&server)
        .put(b"data".to_vec(), PutOptions::default())
        .await
        .unwrap();
    assert_eq!(stored.content_id, ContentId::new("existing"));
}

#[tokio::test]
async fn test_get_returns_exact_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/blobs/blob123"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2, 255]))
        .mount(&server)
        .await;

    let data = store(&server).get(&ContentId::new("blob123")).await.unwrap();
    assert_eq!(&data[..], &[0u8, 1, 2, 255]);
}

#[tokio::test]
async fn test_get_failure_carries_status_and_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server).with_retry(RetryPolicy::exponential(3, Duration::from_millis(1)));
    let err = store.get(&ContentId::new("missing")).await.unwrap_err();
    assert!(matches!(err, BlobError::Fetch { status: 404 }));
}

#[tokio::test]
async fn test_put_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "newlyCreated": { "blobObject": { "blobId": "third-time" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server).with_retry(RetryPolicy::exponential(3, Duration::from_millis(1)));
    let stored = store.put(b"data".to_vec(), PutOptions::default()).await.unwrap();
    assert_eq!(stored.content_id, ContentId::new("third-time"));
}

#[tokio::test]
async fn test_put_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(413))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server).with_retry(RetryPolicy::exponential(3, Duration::from_millis(1)));
    let err = store.put(b"data".to_vec(), PutOptions::default()).await.unwrap_err();
    assert!(matches!(err, BlobError::Upload { status: 413 }));
}

#[tokio::test]
async fn test_put_without_retry_fails_once() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = store(&server)
        .put(b"data".to_vec(), PutOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_exists_uses_head() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/v1/blobs/present"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store(&server);
    assert!(store.exists(&ContentId::new("present")).await.unwrap());
    assert!(!store.exists(&ContentId::new("absent")).await.unwrap());
}
