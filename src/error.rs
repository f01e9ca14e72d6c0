use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinError;

use crate::config::ConfigBuilderError;

/// Stage of a transfer an [`Error`] was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Building the downloader or parsing its inputs
    Setup,
    /// Capability probe of the remote resource
    Probe,
    /// Fetching and persisting chunks
    Transfer,
    /// Reassembling persisted chunks into the output file
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Probe => "probe",
            Self::Transfer => "transfer",
            Self::Assemble => "assemble",
        };
        f.write_str(name)
    }
}

/// Error definition for possible errors in this crate
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the capability request failed or got a non-success status
    #[error("Capability probe of {url} failed: {source}")]
    ProbeFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Returned when a chunk request failed or got a non-success status
    #[error("Fetching chunk {id} failed: {source}")]
    FetchFailed {
        id: u64,
        #[source]
        source: reqwest::Error,
    },
    /// Returned when a ranged response body doesn't match the requested range
    #[error("Chunk {id} has {actual} bytes, expected {expected}")]
    ChunkLength { id: u64, expected: u64, actual: u64 },
    /// Returned when a chunk couldn't be persisted
    #[error("Storing chunk {id} at {} failed: {source}", path.display())]
    StoreWriteFailed {
        id: u64,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Returned when a persisted chunk couldn't be read back or removed
    #[error("Reading chunk {id} from {} failed: {source}", path.display())]
    StoreReadFailed {
        id: u64,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Returned when the output file couldn't be created or written
    #[error("Assembling {} failed: {source}", path.display())]
    AssembleFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Returned when fewer chunks were reassembled than the transfer stored
    #[error("Assembled {assembled} of {expected} chunks into {}", path.display())]
    Incomplete {
        path: PathBuf,
        expected: u64,
        assembled: u64,
    },
    /// Returned when the chunk directory couldn't be prepared
    #[error("Preparing chunk directory {} failed: {source}", path.display())]
    StoreInit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Returned when the transfer was stopped before every chunk was stored
    #[error("Transfer stopped before completion")]
    Stopped,
    /// Returned when a worker task panicked or was aborted
    #[error("Worker task failed: {0}")]
    Canceled(#[from] JoinError),
    /// Returned when the configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigBuilderError),
    /// Returned when the selected chunk size == 0
    #[error("Invalid chunk size")]
    BadChunkSize,
    /// Returned when the url couldn't be parsed
    #[error("Failed to parse URL: {0}")]
    UrlParse(#[from] url::ParseError),
    /// Returned when there's no filename in the url
    #[error("No filename in url {0}")]
    NoFilename(String),
    /// Returned when the HTTP client couldn't be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl Error {
    /// Stage of the transfer this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            Self::ProbeFailed { .. } => Stage::Probe,
            Self::FetchFailed { .. }
            | Self::ChunkLength { .. }
            | Self::StoreWriteFailed { .. }
            | Self::StoreInit { .. }
            | Self::Stopped
            | Self::Canceled(_) => Stage::Transfer,
            Self::StoreReadFailed { .. } | Self::AssembleFailed { .. } | Self::Incomplete { .. } => {
                Stage::Assemble
            }
            Self::Config(_)
            | Self::BadChunkSize
            | Self::UrlParse(_)
            | Self::NoFilename(_)
            | Self::Client(_) => Stage::Setup,
        }
    }

    /// Chunk identifier the error refers to, if any
    pub fn chunk_id(&self) -> Option<u64> {
        match self {
            Self::FetchFailed { id, .. }
            | Self::ChunkLength { id, .. }
            | Self::StoreWriteFailed { id, .. }
            | Self::StoreReadFailed { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Alias for Result<T, chunkdl::Error>
pub type Result<T> = std::result::Result<T, Error>;
