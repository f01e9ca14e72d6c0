//! The two ways of moving a resource into the chunk store
//!
//! [`Strategy::Ranged`] splits a resource of known length into byte ranges and
//! fetches them in parallel; [`Strategy::Streamed`] reads one response body in
//! fixed-size slices shared out between the workers. Which one runs is decided
//! by [`Strategy::select`] from the probed [`Capability`] alone.

mod ranged;
mod streamed;

use crate::progress::Progress;
use crate::store::ChunkStore;
use crate::{Capability, Result};
use reqwest::{Client, Url};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Transfer algorithm used for one download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Parallel range requests over a resource of known length
    Ranged {
        /// Total length of the resource
        length: u64,
    },
    /// A single response body split into slices as it arrives
    Streamed,
}

impl Strategy {
    /// Pick the strategy for a resource
    ///
    /// Ranges are only used when the length is known and non-zero, the server
    /// accepts ranges and the streamed strategy isn't forced.
    pub fn select(capability: &Capability, force_streamed: bool) -> Self {
        match capability.length {
            Some(length) if length > 0 && capability.accepts_ranges && !force_streamed => {
                Strategy::Ranged { length }
            }
            _ => Strategy::Streamed,
        }
    }

    #[instrument(skip(self, transfer), fields(strategy = %self, URL = %transfer.url))]
    pub(crate) async fn run(self, transfer: &Transfer) -> Result<u64> {
        match self {
            Strategy::Ranged { length } => ranged::run(transfer, length).await,
            Strategy::Streamed => streamed::run(transfer).await,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Ranged { .. } => f.write_str("ranged"),
            Strategy::Streamed => f.write_str("streamed"),
        }
    }
}

/// Everything a strategy needs for one transfer
#[derive(Debug, Clone)]
pub(crate) struct Transfer {
    pub(crate) client: Client,
    pub(crate) url: Url,
    pub(crate) store: Arc<ChunkStore>,
    pub(crate) chunk_size: u64,
    pub(crate) workers: usize,
    pub(crate) queue_depth: usize,
    pub(crate) stop: CancellationToken,
    pub(crate) progress: Progress,
}
