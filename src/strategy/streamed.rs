use super::Transfer;
use crate::pool::Workers;
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::convert::TryFrom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One slice of a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slice {
    pub(crate) data: Bytes,
    /// Set on the slice read when the body ended
    pub(crate) last: bool,
}

/// Cuts a byte stream into slices of a fixed size
///
/// Network frames are buffered until a full slice is available; only the
/// slice read at the end of the stream can be shorter, and it may be empty.
#[derive(Debug)]
pub(crate) struct SliceReader<S> {
    stream: S,
    buf: BytesMut,
    finished: bool,
}

impl<S, E> SliceReader<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
{
    pub(crate) fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
            finished: false,
        }
    }

    /// Read the next slice, `None` once the final slice was handed out
    pub(crate) async fn next_slice(&mut self, size: usize) -> std::result::Result<Option<Slice>, E> {
        if self.finished {
            return Ok(None);
        }
        while self.buf.len() < size {
            match self.stream.next().await {
                Some(Ok(bytes)) => self.buf.extend_from_slice(&bytes),
                Some(Err(e)) => return Err(e),
                None => {
                    self.finished = true;
                    break;
                }
            }
        }
        let take = size.min(self.buf.len());
        Ok(Some(Slice {
            data: self.buf.split_to(take).freeze(),
            last: self.finished,
        }))
    }
}

pub(super) async fn run(transfer: &Transfer) -> Result<u64> {
    let store = transfer.store.clone();
    let resp = transfer
        .client
        .get(transfer.url.clone())
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|source| Error::FetchFailed { id: 0, source })?;
    info!(
        "Streaming body in {} byte slices with {} workers",
        transfer.chunk_size, transfer.workers
    );

    let size = usize::try_from(transfer.chunk_size).unwrap_or(usize::MAX);
    let reader = Arc::new(Mutex::new(SliceReader::new(Box::pin(resp.bytes_stream()))));
    let stored = Arc::new(AtomicU64::new(0));
    let stop = transfer.stop.clone();
    let progress = transfer.progress.clone();

    let workers = Workers::spawn(transfer.workers, stop.clone(), |worker| {
        let reader = reader.clone();
        let store = store.clone();
        let stored = stored.clone();
        let stop = stop.clone();
        let progress = progress.clone();
        async move {
            while !stop.is_cancelled() {
                // reading the slice and claiming its id happen under one lock,
                // so ids follow the order of the bytes in the body
                let (id, slice) = {
                    let mut reader = tokio::select! {
                        biased;
                        _ = stop.cancelled() => break,
                        guard = reader.lock() => guard,
                    };
                    match reader.next_slice(size).await {
                        Ok(Some(slice)) => (store.next_id(), slice),
                        Ok(None) => break,
                        Err(source) => {
                            return Err(Error::FetchFailed {
                                id: store.next_id(),
                                source,
                            })
                        }
                    }
                };
                debug!("Worker {} read chunk {} ({} bytes)", worker, id, slice.data.len());
                store.put(id, &slice.data).await?;
                progress.inc(slice.data.len() as u64);
                stored.fetch_add(1, Ordering::SeqCst);
                if slice.last {
                    break;
                }
            }
            debug!("Worker {} done", worker);
            Ok(())
        }
    });
    workers.join().await?;
    if stop.is_cancelled() {
        return Err(Error::Stopped);
    }
    Ok(stored.load(Ordering::SeqCst))
}
