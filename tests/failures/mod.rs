use crate::{init_logging, payload, start_server, url, FAILING_FROM, TRUNCATED_AT};
use chunkdl::{Config, Downloader, Error, Stage};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn downloader(chunk_dir: &Path, chunk_size: u64) -> Downloader {
    let config = Config::builder()
        .chunk_size(chunk_size)
        .workers(4usize)
        .chunk_dir(chunk_dir)
        .build()
        .unwrap();
    Downloader::new(config).unwrap()
}

fn is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

/// Whether a finished chunk entry exists anywhere below `dir`
fn has_chunk(dir: &Path) -> bool {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return false,
    };
    entries.filter_map(|e| e.ok()).any(|e| {
        let path = e.path();
        if path.is_dir() {
            has_chunk(&path)
        } else {
            !path.to_string_lossy().ends_with(".part")
        }
    })
}

async fn wait_for_chunk(dir: &Path) {
    for _ in 0..500 {
        if has_chunk(dir) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no chunk was stored in {}", dir.display());
}

/// Stop the download as soon as its first chunk is on disk
async fn stop_after_first_chunk(mode: &str, chunk_size: u64) {
    init_logging();
    let addr = start_server(payload(20_000)).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let url = url(addr, mode);
    let dl = downloader(chunks.path(), chunk_size);
    let handle = dl.stop_handle();
    let (res, _) = tokio::join!(dl.download(&url, &path), async {
        wait_for_chunk(chunks.path()).await;
        handle.stop();
    });

    let err = res.unwrap_err();
    assert!(matches!(err, Error::Stopped), "{:?}", err);
    assert!(!path.exists());
    assert!(is_empty(chunks.path()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn server_error_fails_the_probe() {
    init_logging();
    let addr = start_server(payload(100)).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let err = downloader(chunks.path(), 10)
        .download(&url(addr, "broken"), &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProbeFailed { .. }), "{:?}", err);
    assert_eq!(err.stage(), Stage::Probe);
    assert!(!path.exists());
}

#[tokio::test]
async fn unreachable_host_fails_the_probe() {
    init_logging();
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let err = downloader(chunks.path(), 10)
        .download("http://127.0.0.1:1/file.bin", &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProbeFailed { .. }), "{:?}", err);
    assert!(!path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_chunk_aborts_without_output() {
    init_logging();
    let chunk_size = 500;
    let addr = start_server(payload(20_000)).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let err = downloader(chunks.path(), chunk_size)
        .download(&url(addr, "failing"), &path)
        .await
        .unwrap_err();

    match err {
        Error::FetchFailed { id, .. } => assert!(id * chunk_size >= FAILING_FROM),
        other => panic!("expected a failed fetch, got {:?}", other),
    }
    assert!(!path.exists());
    assert!(is_empty(chunks.path()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ignored_range_is_rejected() {
    init_logging();
    let addr = start_server(payload(3_000)).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let err = downloader(chunks.path(), 1000)
        .download(&url(addr, "ignoring"), &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ChunkLength { expected: 1000, .. }), "{:?}", err);
    assert_eq!(err.stage(), Stage::Transfer);
    assert_eq!(err.chunk_id().map(|id| id < 3), Some(true));
    assert!(!path.exists());
    assert!(is_empty(chunks.path()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stopped_downloader_writes_nothing() {
    init_logging();
    let addr = start_server(payload(200_000)).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let dl = downloader(chunks.path(), 100);
    dl.stop_handle().stop();
    let err = dl.download(&url(addr, "ranged"), &path).await.unwrap_err();

    assert!(matches!(err, Error::Stopped));
    assert!(!path.exists());
    assert!(is_empty(chunks.path()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_during_ranged_transfer() {
    stop_after_first_chunk("slow", 100).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_during_streamed_transfer() {
    stop_after_first_chunk("slowstream", 500).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn broken_body_fails_streamed_transfer() {
    init_logging();
    let chunk_size = 1000;
    let addr = start_server(payload(10_000)).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let err = downloader(chunks.path(), chunk_size)
        .download(&url(addr, "truncated"), &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FetchFailed { .. }), "{:?}", err);
    assert_eq!(err.stage(), Stage::Transfer);
    let id = err.chunk_id().unwrap();
    assert!(id * chunk_size <= TRUNCATED_AT as u64, "failed at chunk {}", id);
    assert!(!path.exists());
    assert!(is_empty(chunks.path()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_stream_request_is_chunk_zero() {
    init_logging();
    let addr = start_server(payload(1_000)).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let err = downloader(chunks.path(), 100)
        .download(&url(addr, "streambroken"), &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FetchFailed { id: 0, .. }), "{:?}", err);
    assert!(!path.exists());
    assert!(is_empty(chunks.path()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unusable_chunk_dir_fails_before_transfer() {
    init_logging();
    let addr = start_server(payload(1_000)).await;
    let out = TempDir::new().unwrap();
    let not_a_dir = out.path().join("chunks");
    std::fs::write(&not_a_dir, b"occupied").unwrap();
    let path = out.path().join("file.bin");

    let err = downloader(&not_a_dir, 100)
        .download(&url(addr, "streamed"), &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StoreInit { .. }), "{:?}", err);
    assert_eq!(err.stage(), Stage::Transfer);
    assert!(!path.exists());
}
