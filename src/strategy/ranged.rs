use super::Transfer;
use crate::chunk::{ChunkRange, Chunks};
use crate::pool::WorkerPool;
use crate::progress::Progress;
use crate::store::ChunkStore;
use crate::{Error, Result};
use bytes::BytesMut;
use reqwest::header::RANGE;
use reqwest::{Client, Url};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub(super) async fn run(transfer: &Transfer, length: u64) -> Result<u64> {
    let chunks = Chunks::new(length, transfer.chunk_size)?;
    let total = Chunks::total(length, transfer.chunk_size);
    info!(
        "Downloading {} bytes as {} chunks with {} workers",
        length, total, transfer.workers
    );

    let client = transfer.client.clone();
    let url = Arc::new(transfer.url.clone());
    let store = transfer.store.clone();
    let progress = transfer.progress.clone();
    let pool = WorkerPool::new(
        transfer.workers,
        transfer.queue_depth,
        transfer.stop.clone(),
        move |worker, chunk: ChunkRange| {
            let client = client.clone();
            let url = url.clone();
            let store = store.clone();
            let progress = progress.clone();
            async move { download_chunk(worker, &client, &url, &store, chunk, &progress).await }
        },
    );

    let mut dispatched = Ok(());
    for chunk in chunks {
        if let Err(e) = pool.submit(chunk).await {
            dispatched = Err(e);
            break;
        }
    }
    // a worker error beats the refused submit it caused
    pool.join().await?;
    dispatched?;
    if transfer.stop.is_cancelled() {
        return Err(Error::Stopped);
    }
    Ok(total)
}

#[instrument(skip(client, url, store, progress), fields(chunk = %chunk))]
async fn download_chunk(
    worker: usize,
    client: &Client,
    url: &Url,
    store: &ChunkStore,
    chunk: ChunkRange,
    progress: &Progress,
) -> Result<()> {
    debug!("Worker {} requesting {}", worker, chunk.header_value());
    let to_err = |source| Error::FetchFailed {
        id: chunk.id,
        source,
    };
    let expected = chunk.length();
    let mut resp = client
        .get(url.clone())
        .header(RANGE, chunk.header_value())
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(to_err)?;
    let mut buf = BytesMut::with_capacity(expected as usize);
    while let Some(part) = resp.chunk().await.map_err(to_err)? {
        buf.extend_from_slice(&part);
        if buf.len() as u64 > expected {
            break;
        }
        progress.inc(part.len() as u64);
    }
    if buf.len() as u64 != expected {
        return Err(Error::ChunkLength {
            id: chunk.id,
            expected,
            actual: buf.len() as u64,
        });
    }
    store.put(chunk.id, &buf).await?;
    debug!("Worker {} stored chunk {}", worker, chunk.id);
    Ok(())
}
