use derive_builder::Builder;
use std::path::PathBuf;

/// Default number of bytes requested per chunk (10 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;
/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 5;
/// Default prefix of chunk entries on disk
pub const DEFAULT_CHUNK_PREFIX: &str = "chunk-";

/// Transfer settings shared by every download of a [`Downloader`][crate::Downloader]
///
/// # Example
///
/// ```
/// use chunkdl::ConfigBuilder;
/// # fn main() -> Result<(), chunkdl::Error> {
/// let config = ConfigBuilder::default()
///     .chunk_size(4 * 1024 * 1024)
///     .workers(8usize)
///     .force_streamed(true)
///     .build()?;
/// assert_eq!(config.queue_depth(), 16);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Config {
    /// Bytes per unit of work
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    pub chunk_size: u64,
    /// Size of the worker pool
    #[builder(default = "DEFAULT_WORKERS")]
    pub workers: usize,
    /// Prefix of the chunk entries, the entry for chunk `n` is `<chunk_dir>/<prefix><n>`
    #[builder(setter(into), default = "DEFAULT_CHUNK_PREFIX.to_string()")]
    pub chunk_prefix: String,
    /// Directory the chunk entries live in until reassembly
    #[builder(setter(into), default = "std::env::temp_dir()")]
    pub chunk_dir: PathBuf,
    /// Use the streamed strategy even if the server supports ranges
    #[builder(default)]
    pub force_streamed: bool,
    /// Capacity of the pending task queue, twice the worker count when unset
    #[builder(setter(strip_option), default)]
    pub queue_depth: Option<usize>,
    /// Draw a progress bar while transferring
    #[builder(default)]
    pub progress: bool,
}

impl ConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        check(
            self.chunk_size,
            self.workers,
            self.queue_depth.flatten(),
            self.chunk_prefix.as_deref(),
        )
    }
}

fn check(
    chunk_size: Option<u64>,
    workers: Option<usize>,
    queue_depth: Option<usize>,
    chunk_prefix: Option<&str>,
) -> Result<(), String> {
    if let Some(0) = chunk_size {
        return Err("chunk_size must be greater than zero".to_string());
    }
    if let Some(0) = workers {
        return Err("workers must be greater than zero".to_string());
    }
    if let Some(0) = queue_depth {
        return Err("queue_depth must be greater than zero".to_string());
    }
    match chunk_prefix {
        Some(prefix) if prefix.is_empty() => Err("chunk_prefix must not be empty".to_string()),
        _ => Ok(()),
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
    /// Apply the builder's checks to a config that may have been put together by hand
    pub fn validate(&self) -> crate::Result<()> {
        check(
            Some(self.chunk_size),
            Some(self.workers),
            self.queue_depth,
            Some(&self.chunk_prefix),
        )
        .map_err(|msg| crate::Error::Config(msg.into()))
    }
    /// Effective capacity of the task queue
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.unwrap_or(self.workers * 2)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: DEFAULT_WORKERS,
            chunk_prefix: DEFAULT_CHUNK_PREFIX.to_string(),
            chunk_dir: std::env::temp_dir(),
            force_streamed: false,
            queue_depth: None,
            progress: false,
        }
    }
}
