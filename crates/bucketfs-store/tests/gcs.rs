//! GCS store tests against a mock JSON API.

use bucketfs_config::{GcsSettings, Secret};
use bucketfs_store::{GcsStore, ListOptions, ObjectStore};
use serde_json::json;
use tokio::io::AsyncReadExt;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer, prefix: &str) -> GcsStore {
    let settings = GcsSettings {
        endpoint: Some(server.uri()),
        access_token: Some(Secret::new("test-token")),
    };
    GcsStore::new("photos", prefix, &settings).unwrap()
}

async fn read(store: &GcsStore, key: &str, offset: u64, length: u64) -> Vec<u8> {
    let mut reader = store.open_range_reader(key, offset, length).await.unwrap();
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    buf
}

#[tokio::test]
async fn test_attributes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/photos/o/a%2Fb.txt"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "a/b.txt",
            "size": "1234",
            "updated": "2024-03-01T12:00:00.000Z"
        })))
        .mount(&server)
        .await;

    let attrs = store(&server, "").attributes("a/b.txt").await.unwrap();
    assert_eq!(attrs.size, 1234);
    assert_eq!(attrs.modified.unwrap().to_rfc3339(), "2024-03-01T12:00:00+00:00");
}

#[tokio::test]
async fn test_attributes_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = store(&server, "").attributes("missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_attributes_server_error_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = store(&server, "").attributes("x").await.unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_list_merges_items_and_prefixes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/photos/o"))
        .and(query_param("prefix", ""))
        .and(query_param("delimiter", "/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"name": "a.txt", "size": "1"},
                {"name": "c.txt", "size": "3"}
            ],
            "prefixes": ["b/"]
        })))
        .mount(&server)
        .await;

    let mut cursor = store(&server, "").list(ListOptions::one_level("")).await.unwrap();
    let mut seen = Vec::new();
    while let Some(entry) = cursor.next().await.unwrap() {
        seen.push((entry.key, entry.is_prefix));
    }
    assert_eq!(
        seen,
        vec![
            ("a.txt".to_string(), false),
            ("b/".to_string(), true),
            ("c.txt".to_string(), false),
        ]
    );
}

#[tokio::test]
async fn test_list_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/photos/o"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "2024/b.jpg", "size": "2"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/photos/o"))
        .and(query_param("prefix", "2024/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "2024/a.jpg", "size": "1"}],
            "nextPageToken": "p2"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let mut cursor = store(&server, "2024").list(ListOptions::one_level("")).await.unwrap();
    assert_eq!(cursor.next().await.unwrap().unwrap().key, "a.jpg");
    assert_eq!(cursor.next().await.unwrap().unwrap().key, "b.jpg");
    assert!(cursor.next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_failure_surfaces_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut cursor = store(&server, "").list(ListOptions::one_level("")).await.unwrap();
    let err = cursor.next().await.unwrap_err();
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_range_read_sends_range_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/photos/o/x.txt"))
        .and(query_param("alt", "media"))
        .and(header("range", "bytes=5-7"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"567".to_vec()))
        .mount(&server)
        .await;

    assert_eq!(read(&store(&server, ""), "x.txt", 5, 3).await, b"567");
}

#[tokio::test]
async fn test_range_read_full_body_is_sliced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/photos/o/x.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"0123456789".to_vec()))
        .mount(&server)
        .await;

    assert_eq!(read(&store(&server, ""), "x.txt", 2, 3).await, b"234");
}

#[tokio::test]
async fn test_range_read_past_end_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(416))
        .mount(&server)
        .await;

    assert!(read(&store(&server, ""), "x.txt", 100, 10).await.is_empty());
}

#[tokio::test]
async fn test_zero_length_read_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    assert!(read(&store(&server, ""), "x.txt", 0, 0).await.is_empty());
}

#[tokio::test]
async fn test_range_read_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = store(&server, "").open_range_reader("gone", 0, 10).await.err().unwrap();
    assert!(err.is_not_found());
}
