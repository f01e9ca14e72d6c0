use crate::progress::Progress;
use crate::store::ChunkStore;
use crate::strategy::{Strategy, Transfer};
use crate::{probe, Capability, Config, Error, Result};
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Outcome of a finished download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    /// URL the file was fetched from
    pub url: String,
    /// Location of the assembled file
    pub path: PathBuf,
    /// What the probe found out about the resource
    pub capability: Capability,
    /// Strategy the transfer used
    pub strategy: Strategy,
    /// Number of chunks the file was assembled from
    pub chunks: u64,
    /// Size of the assembled file
    pub bytes: u64,
}

/// Handle used to stop a [`Downloader`] from dispatching more work
///
/// Chunks already being written are finished; the running transfer then
/// fails with [`Error::Stopped`] and nothing is assembled. The downloader
/// stays stopped afterwards.
#[derive(Debug, Clone)]
pub struct StopHandle(CancellationToken);

impl StopHandle {
    pub fn stop(&self) {
        self.0.cancel();
    }
    pub fn is_stopped(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Downloads a file in chunks over several concurrent workers
///
/// Each download probes the resource, picks a [`Strategy`], runs it to
/// completion and only then reassembles the stored chunks into the output.
/// The first error ends the download.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    config: Config,
    stop: CancellationToken,
}

impl Downloader {
    /// Create a new downloader
    ///
    /// # Arguments
    /// * `config` - chunk size, worker count and chunk storage settings
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chunkdl::{Config, Downloader};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), chunkdl::Error> {
    ///     let config = Config::builder().workers(8usize).build()?;
    ///     let downloader = Downloader::new(config)?;
    ///     let done = downloader.download_to_dir("https://crates.io/robots.txt", ".").await?;
    ///     println!("{} bytes in {} chunks", done.bytes, done.chunks);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder().build().map_err(Error::Client)?;
        Self::with_client(client, config)
    }

    /// Create a downloader around an existing [`Client`]
    ///
    /// Fails with [`Error::Config`] if `config` breaks the rules
    /// [`ConfigBuilder`][crate::ConfigBuilder] enforces.
    pub fn with_client(client: Client, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            stop: CancellationToken::new(),
        })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle that stops running and future downloads
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    /// Probe `url` without downloading it
    pub async fn probe(&self, url: &str) -> Result<Capability> {
        let url = Url::parse(url)?;
        probe::probe(&self.client, &url).await
    }

    /// Download `url` into `output`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use chunkdl::{Config, Downloader};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), chunkdl::Error> {
    /// let downloader = Downloader::new(Config::default())?;
    /// let done = downloader.download("https://crates.io/robots.txt", "robots.txt").await?;
    /// assert_eq!(done.path.to_str(), Some("robots.txt"));
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self, output), fields(URL = %url, workers = self.config.workers))]
    pub async fn download(&self, url: &str, output: impl AsRef<Path>) -> Result<Downloaded> {
        let output = output.as_ref();
        let parsed = Url::parse(url)?;
        if self.stop.is_cancelled() {
            return Err(Error::Stopped);
        }

        let capability = probe::probe(&self.client, &parsed).await?;
        let strategy = Strategy::select(&capability, self.config.force_streamed);
        info!("Using {} strategy", strategy);

        let store = Arc::new(
            ChunkStore::create_in(&self.config.chunk_dir, &self.config.chunk_prefix).await?,
        );
        let transfer = Transfer {
            client: self.client.clone(),
            url: parsed,
            store: store.clone(),
            chunk_size: self.config.chunk_size,
            workers: self.config.workers,
            queue_depth: self.config.queue_depth(),
            stop: self.stop.child_token(),
            progress: Progress::new(self.config.progress, capability.length),
        };
        let transferred = strategy.run(&transfer).await;
        transfer.progress.finish();
        let chunks = match transferred {
            Ok(chunks) => chunks,
            Err(e) => {
                discard(&store).await;
                return Err(e);
            }
        };
        info!("Transfer complete, {} chunks stored", chunks);

        let assembled = store.assemble(output).await?;
        if assembled.chunks != chunks {
            if let Err(e) = tokio::fs::remove_file(output).await {
                warn!("Failed to remove truncated {}: {}", output.display(), e);
            }
            return Err(incomplete(output, chunks, assembled.chunks));
        }
        Ok(Downloaded {
            url: url.to_string(),
            path: output.to_path_buf(),
            capability,
            strategy,
            chunks: assembled.chunks,
            bytes: assembled.bytes,
        })
    }

    /// Download `url` into `dir`, naming the file after the last URL segment
    pub async fn download_to_dir(&self, url: &str, dir: impl AsRef<Path>) -> Result<Downloaded> {
        let parsed = Url::parse(url)?;
        let filename = Self::url_to_filename(&parsed)?;
        self.download(url, dir.as_ref().join(filename)).await
    }

    pub fn url_to_filename(url: &Url) -> Result<String> {
        url.path_segments()
            .and_then(|segments| segments.last())
            .and_then(|name| {
                if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                }
            })
            .ok_or_else(|| Error::NoFilename(url.to_string()))
    }
}

fn incomplete(output: &Path, expected: u64, assembled: u64) -> Error {
    Error::Incomplete {
        path: output.to_path_buf(),
        expected,
        assembled,
    }
}

async fn discard(store: &ChunkStore) {
    match store.clear().await {
        Ok(removed) => debug!("Removed {} chunk entries of failed transfer", removed),
        Err(e) => warn!("Failed to remove chunk entries in {}: {}", store.dir().display(), e),
    }
}
