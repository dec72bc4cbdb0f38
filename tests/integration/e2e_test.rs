// End-to-end: upload -> transform from source -> serve from cache -> delete

use super::test_harness::*;
use http::header::CONTENT_TYPE;
use http::StatusCode;
use hyperpic::constants::X_IMAGE_FROM;

fn image_from(response: &hyperpic::proxy::ImageResponse) -> &str {
    response
        .headers
        .get(&X_IMAGE_FROM)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

#[tokio::test]
async fn test_upload_get_cache_delete_lifecycle() {
    let harness = Harness::new();
    let original = sample_jpeg(80, 60);

    let uploaded = harness.upload("/a.jpg", original.clone()).await;
    assert_eq!(uploaded.status, StatusCode::CREATED);
    let receipt: serde_json::Value = serde_json::from_slice(&uploaded.body).unwrap();
    assert_eq!(receipt["file"], "/a.jpg");
    assert_eq!(receipt["size"], original.len());
    assert_eq!(receipt["type"], "image/jpeg");
    assert_eq!(receipt["hash"].as_str().unwrap().len(), 64);
    assert!(harness.source_root.join("a.jpg").is_file());

    let first = harness.get("/a.jpg", "w=40&h=40").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(image_from(&first), "source");
    assert_eq!(first.headers.get(CONTENT_TYPE).unwrap(), "image/jpeg");
    assert_eq!(decoded_dimensions(&first.body), (40, 30));

    harness.wait_for_cache("/a.jpg", 1).await;

    let second = harness.get("/a.jpg", "w=40&h=40").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(image_from(&second), "cache");
    assert_eq!(second.body, first.body);

    let deleted = harness.delete("/a.jpg", "from=source").await;
    assert_eq!(deleted.status, StatusCode::OK);
    let cleared: serde_json::Value = serde_json::from_slice(&deleted.body).unwrap();
    assert_eq!(cleared, serde_json::json!({"cache": true, "source": true}));
    assert_eq!(harness.cached_derivatives("/a.jpg"), 0);

    let gone = harness.get("/a.jpg", "w=40&h=40").await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reupload_invalidates_derivatives() {
    let harness = Harness::new();
    harness.upload("/b.jpg", sample_jpeg(64, 64)).await;

    harness.get("/b.jpg", "w=16").await;
    harness.get("/b.jpg", "w=32").await;
    harness.wait_for_cache("/b.jpg", 2).await;

    let replaced = harness.upload("/b.jpg", sample_jpeg(20, 10)).await;
    assert_eq!(replaced.status, StatusCode::CREATED);
    assert_eq!(harness.cached_derivatives("/b.jpg"), 0);

    let fresh = harness.get("/b.jpg", "").await;
    assert_eq!(image_from(&fresh), "source");
    assert_eq!(decoded_dimensions(&fresh.body), (20, 10));
}

#[tokio::test]
async fn test_format_conversion() {
    let harness = Harness::new();
    harness.upload("/c.jpg", sample_jpeg(30, 30)).await;

    let png = harness.get("/c.jpg", "fm=png&w=10").await;
    assert_eq!(png.status, StatusCode::OK);
    assert_eq!(png.headers.get(CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(&png.body[..4], &[0x89, 0x50, 0x4E, 0x47]);
}

#[tokio::test]
async fn test_png_upload_sniffed() {
    let harness = Harness::new();
    let uploaded = harness.upload("/d.png", sample_png(8, 8)).await;
    let receipt: serde_json::Value = serde_json::from_slice(&uploaded.body).unwrap();
    assert_eq!(receipt["type"], "image/png");
}

#[tokio::test]
async fn test_corrupt_source_is_500_and_not_cached() {
    let harness = Harness::new();
    harness
        .upload("/broken.jpg", b"definitely not a jpeg".to_vec())
        .await;

    let response = harness.get("/broken.jpg", "w=10").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(harness.cached_derivatives("/broken.jpg"), 0);
}

#[tokio::test]
async fn test_oversized_transform_rejected_and_server_survives() {
    let harness = Harness::new();
    harness.upload("/big.jpg", sample_jpeg(8, 8)).await;

    let huge = harness.get("/big.jpg", "w=50000&h=50000&fit=stretch").await;
    assert_eq!(huge.status, StatusCode::BAD_REQUEST);

    let scaled = harness.get("/big.jpg", "w=3000&h=3000&dpr=2").await;
    assert_eq!(scaled.status, StatusCode::BAD_REQUEST);

    let ok = harness.get("/big.jpg", "w=16&h=16").await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(decoded_dimensions(&ok.body), (16, 16));
}

#[tokio::test]
async fn test_traversal_rejected_everywhere() {
    let harness = Harness::new();

    let get = harness.get("/../secret.jpg", "").await;
    assert_eq!(get.status, StatusCode::BAD_REQUEST);

    let post = harness.upload("/a/../../secret.jpg", vec![1, 2, 3]).await;
    assert_eq!(post.status, StatusCode::BAD_REQUEST);

    let delete = harness.delete("/%2E%2E/secret.jpg", "from=source").await;
    assert_eq!(delete.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let harness = Harness::new();
    harness.upload("/m.jpg", sample_jpeg(10, 10)).await;
    harness.get("/m.jpg", "").await;

    let health = harness.get("/health", "").await;
    assert_eq!(health.status, StatusCode::OK);

    let metrics = harness.get("/metrics", "").await;
    let text = String::from_utf8(metrics.body.to_vec()).unwrap();
    assert!(text.contains("hyperpic_cache_misses_total 1"));
    assert!(text.contains("hyperpic_image_received_bytes_total"));
}
