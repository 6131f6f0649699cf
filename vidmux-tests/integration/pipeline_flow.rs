//! Pipeline state-machine integration tests: terminal outcomes and the
//! no-leaked-scratch-files guarantee on every exit path.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use vidmux_core::pipeline::{
    PipelineError, PipelineJob, PipelineOrchestrator, init_scratch_dir,
};
use vidmux_core::resolver::ResolveError;

use crate::support::{
    AUDIO_BYTES, ConcatMuxer, FailingMuxer, VIDEO_BYTES, arc_provider, canned_media,
    scratch_entries, spawn_variant_server, test_config,
};

const LOCATOR: &str = "https://youtu.be/dQw4w9WgXcQ";

#[tokio::test]
async fn test_successful_job_delivers_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    init_scratch_dir(&scratch).await.unwrap();

    let server = spawn_variant_server().await;
    let provider = arc_provider(canned_media("Fixture Clip: Live!", server, "/audio"));
    let orchestrator =
        PipelineOrchestrator::new(&test_config(&scratch), provider.clone(), Arc::new(ConcatMuxer));

    let job = PipelineJob::new(&scratch, LOCATOR, "137", "140");
    let mut deliverable = orchestrator.run(job).await.unwrap();

    // Filename comes from the sanitized title.
    assert_eq!(deliverable.filename, "Fixture Clip Live.mp4");
    assert_eq!(provider.calls(), 1);

    // The open handle still yields the full output even though the scratch
    // files are already unlinked.
    let mut delivered = Vec::new();
    deliverable.file.read_to_end(&mut delivered).await.unwrap();
    let mut expected = VIDEO_BYTES.to_vec();
    expected.extend_from_slice(AUDIO_BYTES);
    assert_eq!(delivered, expected);
    assert_eq!(deliverable.size, expected.len() as u64);

    assert_eq!(scratch_entries(&scratch), 0);
}

#[tokio::test]
async fn test_failed_audio_transfer_fails_job_and_leaves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    init_scratch_dir(&scratch).await.unwrap();

    let server = spawn_variant_server().await;
    // Audio leg hits the 500 route while the video leg succeeds.
    let provider = arc_provider(canned_media("Half Broken", server, "/broken"));
    let orchestrator =
        PipelineOrchestrator::new(&test_config(&scratch), provider, Arc::new(ConcatMuxer));

    let job = PipelineJob::new(&scratch, LOCATOR, "137", "140");
    let result = orchestrator.run(job).await;

    match result {
        Err(PipelineError::Download { variant_id, .. }) => assert_eq!(variant_id, "140"),
        other => panic!("expected download error, got {other:?}"),
    }
    assert_eq!(scratch_entries(&scratch), 0);
}

#[tokio::test]
async fn test_unknown_variant_rejected_before_any_download() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    init_scratch_dir(&scratch).await.unwrap();

    let server = spawn_variant_server().await;
    let provider = arc_provider(canned_media("Roles Matter", server, "/audio"));
    let orchestrator =
        PipelineOrchestrator::new(&test_config(&scratch), provider.clone(), Arc::new(ConcatMuxer));

    // "22" exists but carries both streams, so it cannot fill the
    // audio-only slot.
    let job = PipelineJob::new(&scratch, LOCATOR, "137", "22");
    let result = orchestrator.run(job).await;

    assert!(matches!(result, Err(PipelineError::UnknownVariant { .. })));
    assert_eq!(provider.calls(), 1);
    // Rejection happened before Downloading: no scratch file was ever made.
    assert_eq!(scratch_entries(&scratch), 0);
}

#[tokio::test]
async fn test_invalid_locator_short_circuits_without_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    init_scratch_dir(&scratch).await.unwrap();

    let server = spawn_variant_server().await;
    let provider = arc_provider(canned_media("Never Resolved", server, "/audio"));
    let orchestrator =
        PipelineOrchestrator::new(&test_config(&scratch), provider.clone(), Arc::new(ConcatMuxer));

    let job = PipelineJob::new(&scratch, "bad-url", "137", "140");
    let result = orchestrator.run(job).await;

    assert!(matches!(
        result,
        Err(PipelineError::Resolve(ResolveError::InvalidLocator { .. }))
    ));
    assert_eq!(provider.calls(), 0);
    assert_eq!(scratch_entries(&scratch), 0);
}

#[tokio::test]
async fn test_mux_failure_still_erases_downloaded_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    init_scratch_dir(&scratch).await.unwrap();

    let server = spawn_variant_server().await;
    let provider = arc_provider(canned_media("Mux Goes Boom", server, "/audio"));
    let orchestrator =
        PipelineOrchestrator::new(&test_config(&scratch), provider, Arc::new(FailingMuxer));

    let job = PipelineJob::new(&scratch, LOCATOR, "137", "140");
    let result = orchestrator.run(job).await;

    assert!(matches!(result, Err(PipelineError::Mux { .. })));
    // Both completed downloads must be gone after the failure is reported.
    assert_eq!(scratch_entries(&scratch), 0);
}
