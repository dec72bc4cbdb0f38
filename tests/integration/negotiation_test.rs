// Accept negotiation and client hints through the whole orchestrator

use super::test_harness::*;
use http::header::{CONTENT_TYPE, VARY};
use http::{Method, StatusCode};
use hyperpic::constants::CONTENT_DPR;
use hyperpic::pipeline::ImageRequest;
use hyperpic::proxy::ImageResponse;

async fn get_with(harness: &Harness, query: &str, headers: &[(&'static str, &str)]) -> ImageResponse {
    let mut request = ImageRequest::new(Method::GET, "/n.jpg").with_query(query);
    for (name, value) in headers {
        request = request.with_header(*name, value);
    }
    harness.service.handle(request).await
}

fn vary(response: &ImageResponse) -> String {
    response.vary().unwrap_or_default()
}

#[tokio::test]
async fn test_accept_png_without_fm() {
    let harness = Harness::new();
    harness.upload("/n.jpg", sample_jpeg(20, 20)).await;

    let response = get_with(&harness, "w=10", &[("accept", "image/png")]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "image/png");
    assert!(vary(&response).contains("Accept"));
    assert_eq!(&response.body[..4], &[0x89, 0x50, 0x4E, 0x47]);
}

#[tokio::test]
async fn test_explicit_fm_ignores_accept() {
    let harness = Harness::new();
    harness.upload("/n.jpg", sample_jpeg(20, 20)).await;

    let response = get_with(&harness, "fm=jpg", &[("accept", "image/png")]).await;
    assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "image/jpeg");
    assert!(!vary(&response).contains("Accept"));
}

#[tokio::test]
async fn test_dpr_and_save_data_hints() {
    let harness = Harness::new();
    harness.upload("/n.jpg", sample_jpeg(100, 100)).await;

    let response = get_with(
        &harness,
        "w=20&fm=jpg",
        &[("dpr", "2"), ("save-data", "on")],
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get(&CONTENT_DPR).unwrap(), "2.0");
    let vary = vary(&response);
    assert!(vary.contains("DPR"));
    assert!(vary.contains("Save-Data"));
    assert_eq!(decoded_dimensions(&response.body), (40, 40));
}

#[tokio::test]
async fn test_width_hint_overrides_query() {
    let harness = Harness::new();
    harness.upload("/n.jpg", sample_jpeg(100, 50)).await;

    let response = get_with(&harness, "w=80&fm=png", &[("width", "30")]).await;
    assert!(vary(&response).contains("Width"));
    assert_eq!(decoded_dimensions(&response.body), (30, 15));
}

#[tokio::test]
async fn test_hints_produce_distinct_cache_entries() {
    let harness = Harness::new();
    harness.upload("/n.jpg", sample_jpeg(40, 40)).await;

    get_with(&harness, "w=10&fm=jpg", &[]).await;
    get_with(&harness, "w=10&fm=jpg", &[("dpr", "2")]).await;
    harness.wait_for_cache("/n.jpg", 2).await;
}

#[tokio::test]
async fn test_unsupported_extension_is_404() {
    let harness = Harness::new();
    let response = harness.get("/n.gif", "").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"]["message"], "File /n.gif is not supported");
}

#[tokio::test]
async fn test_malformed_query_is_400() {
    let harness = Harness::new();
    harness.upload("/n.jpg", sample_jpeg(10, 10)).await;

    let response = harness.get("/n.jpg", "w=%C3%28").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
