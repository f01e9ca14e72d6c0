//! Chunked parallel downloads with ordered reassembly
//!
//! Fetches one file over HTTP as a set of numbered chunks moved by a pool of
//! concurrent workers, persists every chunk on disk as it arrives and
//! concatenates them in chunk order once the transfer has finished.
//!
//! Two transfer strategies are available and picked per file from a probe of
//! the server:
//!
//! - **ranged**: the length is known and the server accepts `Range` requests,
//!   so the file is split into byte ranges that are requested in parallel
//! - **streamed**: a single response body is read in fixed-size slices that
//!   the workers take turns reading and persisting
//!
//! The crate exposes debug logs through the [`tracing`][tracing] crate
//!
//! ## Feature flags
//!
//! - `progress`: Enables progress reporting using `indicatif`
//! - `rustls`/`openssl`: TLS backend of the [`Client`][reqwest::Client]
//!
//! ## Crate usage
//!
//! # Example
//!
//! ```no_run
//! use chunkdl::{Config, Downloader};
//! #[tokio::main]
//! async fn main() -> Result<(), chunkdl::Error> {
//!     let config = Config::builder()
//!         .chunk_size(1024 * 1024)
//!         .workers(5usize)
//!         .build()?;
//!     let downloader = Downloader::new(config)?;
//!     let result = downloader.download("https://crates.io/robots.txt", "robots.txt").await?;
//!     Ok(())
//! }
//! ```

mod chunk;
mod config;
mod downloader;
mod error;
mod pool;
mod probe;
mod progress;
mod store;
mod strategy;

pub use chunk::{ChunkRange, Chunks};
pub use config::{Config, ConfigBuilder, ConfigBuilderError};
pub use config::{DEFAULT_CHUNK_PREFIX, DEFAULT_CHUNK_SIZE, DEFAULT_WORKERS};
pub use downloader::{Downloaded, Downloader, StopHandle};
pub use error::{Error, Result, Stage};
pub use probe::Capability;
pub use store::{Assembled, ChunkStore};
pub use strategy::Strategy;
pub use reqwest::{header, Client, Url};
