//! In-process API tests: response headers, CORS exposure and the
//! machine-readable error payloads.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::util::ServiceExt;
use vidmux_core::pipeline::init_scratch_dir;
use vidmux_web::{AppState, router};

use crate::support::{
    AUDIO_BYTES, ConcatMuxer, VIDEO_BYTES, arc_provider, canned_media, scratch_entries,
    spawn_variant_server, test_config,
};

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let server = spawn_variant_server().await;
    let state = AppState::new(
        &test_config(dir.path()),
        arc_provider(canned_media("t", server, "/audio")),
        Arc::new(ConcatMuxer),
    );

    let response = router(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"vidmux: ok");
}

#[tokio::test]
async fn test_resolve_returns_partitioned_variants() {
    let dir = tempfile::tempdir().unwrap();
    let server = spawn_variant_server().await;
    let state = AppState::new(
        &test_config(dir.path()),
        arc_provider(canned_media("Resolver Check", server, "/audio")),
        Arc::new(ConcatMuxer),
    );

    let response = router(state)
        .oneshot(
            Request::builder()
                .uri("/api/resolve?url=https://youtu.be/dQw4w9WgXcQ")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(payload["title"], "Resolver Check");
    assert_eq!(payload["video_variants"].as_array().unwrap().len(), 2);
    assert_eq!(payload["audio_variants"].as_array().unwrap().len(), 2);
    assert_eq!(payload["video_variants"][0]["variant_id"], "137");
}

#[tokio::test]
async fn test_resolve_rejects_invalid_locator() {
    let dir = tempfile::tempdir().unwrap();
    let server = spawn_variant_server().await;
    let provider = arc_provider(canned_media("t", server, "/audio"));
    let state = AppState::new(&test_config(dir.path()), provider.clone(), Arc::new(ConcatMuxer));

    let response = router(state)
        .oneshot(
            Request::builder()
                .uri("/api/resolve?url=bad-url")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(payload["error"], "invalid_locator");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_download_response_carries_attachment_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    init_scratch_dir(&scratch).await.unwrap();

    let server = spawn_variant_server().await;
    let state = AppState::new(
        &test_config(&scratch),
        arc_provider(canned_media("Fixture Clip: Live!", server, "/audio")),
        Arc::new(ConcatMuxer),
    );

    let response = router(state)
        .oneshot(
            Request::builder()
                .uri("/api/download?url=dQw4w9WgXcQ&video=137&audio=140")
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "video/mp4"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap(),
        "attachment; filename=\"Fixture Clip Live.mp4\""
    );
    // Cross-origin callers must be able to read the disposition header.
    let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains("content-disposition"), "exposed: {exposed}");

    let mut expected = VIDEO_BYTES.to_vec();
    expected.extend_from_slice(AUDIO_BYTES);
    assert_eq!(body_bytes(response).await, expected);

    assert_eq!(scratch_entries(&scratch), 0);
}

#[tokio::test]
async fn test_download_with_wrong_role_variant_is_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    init_scratch_dir(&scratch).await.unwrap();

    let server = spawn_variant_server().await;
    let state = AppState::new(
        &test_config(&scratch),
        arc_provider(canned_media("Roles Matter", server, "/audio")),
        Arc::new(ConcatMuxer),
    );

    // "22" is a combined variant, not audio-only.
    let response = router(state)
        .oneshot(
            Request::builder()
                .uri("/api/download?url=dQw4w9WgXcQ&video=137&audio=22")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(payload["error"], "unknown_variant");
    assert_eq!(scratch_entries(&scratch), 0);
}
