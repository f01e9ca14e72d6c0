use crate::{init_logging, payload, start_server, url};
use chunkdl::{Capability, Chunks, Config, Downloader, Strategy};
use std::path::Path;
use tempfile::TempDir;

fn downloader(chunk_dir: &Path, chunk_size: u64, workers: usize, force_streamed: bool) -> Downloader {
    let config = Config::builder()
        .chunk_size(chunk_size)
        .workers(workers)
        .chunk_dir(chunk_dir)
        .force_streamed(force_streamed)
        .build()
        .unwrap();
    Downloader::new(config).unwrap()
}

fn leftover_chunks(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn twenty_five_bytes_in_three_ranges() -> chunkdl::Result<()> {
    init_logging();
    let data = payload(25);
    let addr = start_server(data.clone()).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let dl = downloader(chunks.path(), 10, 2, false);
    let done = dl.download(&url(addr, "ranged"), &path).await?;

    assert_eq!(done.strategy, Strategy::Ranged { length: 25 });
    assert_eq!(
        done.capability,
        Capability {
            length: Some(25),
            accepts_ranges: true
        }
    );
    assert_eq!(done.chunks, 3);
    assert_eq!(done.bytes, 25);
    assert_eq!(std::fs::read(&path).unwrap(), data);
    assert_eq!(leftover_chunks(chunks.path()), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ranged_download_with_varied_workers() -> chunkdl::Result<()> {
    init_logging();
    let data = payload(100_003);
    let addr = start_server(data.clone()).await;
    let out = TempDir::new().unwrap();
    for workers in 1..=6 {
        let chunks = TempDir::new().unwrap();
        let path = out.path().join(format!("file-{}.bin", workers));
        let dl = downloader(chunks.path(), 4096, workers, false);
        let done = dl.download(&url(addr, "ranged"), &path).await?;
        assert_eq!(done.chunks, Chunks::total(100_003, 4096));
        assert_eq!(std::fs::read(&path).unwrap(), data);
        assert_eq!(leftover_chunks(chunks.path()), 0);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ten_bytes_streamed_in_fours() -> chunkdl::Result<()> {
    init_logging();
    let data = payload(10);
    let addr = start_server(data.clone()).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let dl = downloader(chunks.path(), 4, 3, false);
    let done = dl.download(&url(addr, "streamed"), &path).await?;

    assert_eq!(done.strategy, Strategy::Streamed);
    assert!(!done.capability.accepts_ranges);
    assert_eq!(done.chunks, 3);
    assert_eq!(done.bytes, 10);
    assert_eq!(std::fs::read(&path).unwrap(), data);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn streamed_download_keeps_byte_order() -> chunkdl::Result<()> {
    init_logging();
    let data = payload(50_000);
    let addr = start_server(data.clone()).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let dl = downloader(chunks.path(), 512, 6, false);
    let done = dl.download(&url(addr, "streamed"), &path).await?;

    assert_eq!(done.chunks, 98);
    assert_eq!(std::fs::read(&path).unwrap(), data);
    assert_eq!(leftover_chunks(chunks.path()), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn forced_streamed_on_range_server() -> chunkdl::Result<()> {
    init_logging();
    let data = payload(20_000);
    let addr = start_server(data.clone()).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let dl = downloader(chunks.path(), 1000, 4, true);
    let done = dl.download(&url(addr, "ranged"), &path).await?;

    assert!(done.capability.accepts_ranges);
    assert_eq!(done.strategy, Strategy::Streamed);
    // 20 full slices, then the empty one read at the end of the body
    assert_eq!(done.chunks, 21);
    assert_eq!(std::fs::read(&path).unwrap(), data);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn probe_falls_back_to_get() -> chunkdl::Result<()> {
    init_logging();
    let data = payload(3_000);
    let addr = start_server(data.clone()).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let dl = downloader(chunks.path(), 1024, 2, false);
    let done = dl.download_to_dir(&url(addr, "nohead"), out.path()).await?;

    assert_eq!(done.strategy, Strategy::Ranged { length: 3_000 });
    assert_eq!(done.path, out.path().join("file.bin"));
    assert_eq!(std::fs::read(&done.path).unwrap(), data);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chunk_larger_than_file() -> chunkdl::Result<()> {
    init_logging();
    let data = payload(777);
    let addr = start_server(data.clone()).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = out.path().join("file.bin");

    let dl = downloader(chunks.path(), 1 << 20, 8, false);
    let done = dl.download(&url(addr, "ranged"), &path).await?;

    assert_eq!(done.chunks, 1);
    assert_eq!(std::fs::read(&path).unwrap(), data);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sequential_downloads_share_a_downloader() -> chunkdl::Result<()> {
    init_logging();
    let first = payload(9_000);
    let second = payload(4_321);
    let first_addr = start_server(first.clone()).await;
    let second_addr = start_server(second.clone()).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let dl = downloader(chunks.path(), 1000, 3, false);
    let a = dl
        .download(&url(first_addr, "ranged"), out.path().join("a"))
        .await?;
    let b = dl
        .download(&url(second_addr, "streamed"), out.path().join("b"))
        .await?;

    assert_eq!(a.chunks, 9);
    assert_eq!(b.chunks, 5);
    assert_eq!(std::fs::read(out.path().join("a")).unwrap(), first);
    assert_eq!(std::fs::read(out.path().join("b")).unwrap(), second);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_downloads_share_a_chunk_dir() -> chunkdl::Result<()> {
    init_logging();
    let first = payload(30_000);
    let second = payload(12_345);
    let first_addr = start_server(first.clone()).await;
    let second_addr = start_server(second.clone()).await;
    let chunks = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let first_url = url(first_addr, "ranged");
    let second_url = url(second_addr, "streamed");
    let dl = downloader(chunks.path(), 1000, 3, false);
    let (a, b) = tokio::join!(
        dl.download(&first_url, out.path().join("a")),
        dl.download(&second_url, out.path().join("b")),
    );

    assert_eq!(a?.chunks, 30);
    assert_eq!(b?.chunks, 13);
    assert_eq!(std::fs::read(out.path().join("a")).unwrap(), first);
    assert_eq!(std::fs::read(out.path().join("b")).unwrap(), second);
    assert_eq!(leftover_chunks(chunks.path()), 0);
    Ok(())
}
