use anyhow::{bail, Context, Result};
use chunkdl::{Config, DEFAULT_CHUNK_PREFIX, DEFAULT_CHUNK_SIZE, DEFAULT_WORKERS};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::{Path, PathBuf};

/// Download files in parallel chunks
#[derive(Debug, Parser)]
#[clap(name = "chunkdl", version)]
pub(crate) struct App {
    /// URLs to download, one after another
    pub(crate) urls: Vec<String>,
    /// File with one URL per line
    #[clap(short = 'f', long)]
    pub(crate) urls_file: Option<PathBuf>,
    /// Directory the downloaded files are written to
    #[clap(short, long, default_value = ".")]
    pub(crate) output: PathBuf,
    /// Bytes per chunk
    #[clap(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub(crate) chunk_size: u64,
    /// Number of concurrent workers
    #[clap(short, long, default_value_t = DEFAULT_WORKERS)]
    pub(crate) workers: usize,
    /// Prefix of the temporary chunk files
    #[clap(short = 'p', long, default_value = DEFAULT_CHUNK_PREFIX)]
    pub(crate) chunk_prefix: String,
    /// Directory for the temporary chunk files, defaults to the system temp dir
    #[clap(long)]
    pub(crate) chunk_dir: Option<PathBuf>,
    /// Read the response as one stream even if the server supports ranges
    #[clap(long)]
    pub(crate) force_streamed: bool,
    /// Don't draw a progress bar
    #[clap(long)]
    pub(crate) no_progress: bool,
    #[clap(flatten)]
    pub(crate) verbose: Verbosity<InfoLevel>,
}

impl App {
    pub(crate) fn new() -> Self {
        Self::parse()
    }

    pub(crate) fn init_logging(&self) {
        pretty_env_logger::formatted_builder()
            .filter_level(self.verbose.log_level_filter())
            .init()
    }

    pub(crate) fn config(&self) -> Result<Config> {
        let mut builder = Config::builder();
        builder
            .chunk_size(self.chunk_size)
            .workers(self.workers)
            .chunk_prefix(self.chunk_prefix.clone())
            .force_streamed(self.force_streamed)
            .progress(!self.no_progress);
        if let Some(dir) = &self.chunk_dir {
            builder.chunk_dir(dir.clone());
        }
        builder.build().context("Invalid options")
    }

    /// URLs given on the command line followed by those from the URLs file
    pub(crate) async fn urls(&self) -> Result<Vec<String>> {
        let mut urls = self.urls.clone();
        if let Some(path) = &self.urls_file {
            urls.extend(read_urls(path).await?);
        }
        if urls.is_empty() {
            bail!("No URLs given, pass them as arguments or with --urls-file");
        }
        Ok(urls)
    }
}

async fn read_urls(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let urls = parse_urls(&content);
    if urls.is_empty() {
        bail!("No URLs found in {}", path.display());
    }
    Ok(urls)
}

fn parse_urls(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
