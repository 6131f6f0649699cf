//! Concurrent job isolation: simultaneous pipelines must not share or
//! remove each other's scratch files.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use vidmux_core::pipeline::{PipelineJob, PipelineOrchestrator, init_scratch_dir};

use crate::support::{
    AUDIO_BYTES, ConcatMuxer, VIDEO_BYTES, arc_provider, canned_media, scratch_entries,
    spawn_variant_server, test_config,
};

#[tokio::test]
async fn test_concurrent_jobs_do_not_interfere() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = dir.path().join("scratch");
    init_scratch_dir(&scratch).await.unwrap();

    let server = spawn_variant_server().await;
    let config = test_config(&scratch);

    let first = PipelineOrchestrator::new(
        &config,
        arc_provider(canned_media("First Resource", server, "/audio")),
        Arc::new(ConcatMuxer),
    );
    let second = PipelineOrchestrator::new(
        &config,
        arc_provider(canned_media("Second Resource", server, "/audio")),
        Arc::new(ConcatMuxer),
    );

    let job_a = PipelineJob::new(&scratch, "https://youtu.be/dQw4w9WgXcQ", "137", "140");
    let job_b = PipelineJob::new(&scratch, "https://youtu.be/aqz-KE-bpKQ", "137", "140");
    assert_ne!(job_a.job_id(), job_b.job_id());

    let (result_a, result_b) = tokio::join!(first.run(job_a), second.run(job_b));
    let mut deliverable_a = result_a.unwrap();
    let mut deliverable_b = result_b.unwrap();

    assert_eq!(deliverable_a.filename, "First Resource.mp4");
    assert_eq!(deliverable_b.filename, "Second Resource.mp4");

    // Each job produced a full, independent output.
    let expected_len = (VIDEO_BYTES.len() + AUDIO_BYTES.len()) as u64;
    for deliverable in [&mut deliverable_a, &mut deliverable_b] {
        assert_eq!(deliverable.size, expected_len);
        let mut body = Vec::new();
        deliverable.file.read_to_end(&mut body).await.unwrap();
        assert_eq!(body.len() as u64, expected_len);
    }

    // Neither job's cleanup touched the other's files, and nothing is left.
    assert_eq!(scratch_entries(&scratch), 0);
}
