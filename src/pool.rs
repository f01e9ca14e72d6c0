//! Fixed-size worker pools with a completion barrier
//!
//! [`Workers`] spawns N identical loops and waits for all of them;
//! [`WorkerPool`] puts a bounded task queue in front of such a group.
//! Both share a [`CancellationToken`] that stops workers from picking up new
//! work. A worker that fails cancels the token, so its siblings drain what
//! they are busy with and exit.

use crate::{Error, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Group of spawned worker tasks
#[derive(Debug)]
pub(crate) struct Workers {
    handles: Vec<JoinHandle<Result<()>>>,
    stop: CancellationToken,
}

impl Workers {
    /// Spawn `count` workers, `work` receives the worker index
    pub(crate) fn spawn<F, Fut>(count: usize, stop: CancellationToken, work: F) -> Self
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handles = (0..count)
            .map(|worker| {
                let fut = work(worker);
                let stop = stop.clone();
                tokio::spawn(async move {
                    let res = fut.await;
                    if let Err(e) = &res {
                        warn!("Worker {} failed: {}", worker, e);
                        stop.cancel();
                    }
                    res
                })
            })
            .collect();
        Self { handles, stop }
    }

    /// Wait for every worker to finish, returning the first error to occur
    pub(crate) async fn join(self) -> Result<()> {
        let stop = self.stop;
        let mut pending = self.handles.into_iter().collect::<FuturesUnordered<_>>();
        let mut first = None;
        while let Some(joined) = pending.next().await {
            let res = joined.map_err(Error::from).and_then(|res| res);
            if let Err(e) = res {
                stop.cancel();
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Bounded task queue drained by a fixed number of workers
pub(crate) struct WorkerPool<T> {
    sender: mpsc::Sender<T>,
    workers: Workers,
    stop: CancellationToken,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Start `count` workers that feed every submitted task to `handler`
    ///
    /// At most `capacity` tasks wait in the queue; [`submit`][WorkerPool::submit]
    /// waits for room beyond that.
    pub(crate) fn new<F, Fut>(
        count: usize,
        capacity: usize,
        stop: CancellationToken,
        handler: F,
    ) -> Self
    where
        F: Fn(usize, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let handler = Arc::new(handler);
        let workers = Workers::spawn(count, stop.clone(), |worker| {
            let receiver = receiver.clone();
            let handler = handler.clone();
            let stop = stop.clone();
            async move {
                loop {
                    let task = tokio::select! {
                        biased;
                        _ = stop.cancelled() => None,
                        task = async { receiver.lock().await.recv().await } => task,
                    };
                    match task {
                        Some(task) => (*handler)(worker, task).await?,
                        None => break,
                    }
                }
                debug!("Worker {} done", worker);
                Ok(())
            }
        });
        Self {
            sender,
            workers,
            stop,
        }
    }

    /// Queue a task, fails with [`Error::Stopped`] once the pool was stopped
    pub(crate) async fn submit(&self, task: T) -> Result<()> {
        if self.stop.is_cancelled() {
            return Err(Error::Stopped);
        }
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => Err(Error::Stopped),
            sent = self.sender.send(task) => sent.map_err(|_| Error::Stopped),
        }
    }

    /// Close the queue and wait until every queued task was handled
    pub(crate) async fn join(self) -> Result<()> {
        drop(self.sender);
        self.workers.join().await
    }
}
