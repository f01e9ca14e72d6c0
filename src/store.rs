//! Durable per-chunk persistence and ordered reassembly
//!
//! Every chunk lives in its own file named `<prefix><id>` inside the chunk
//! directory until [`ChunkStore::assemble`] concatenates them, in ascending
//! identifier order, into the output file and removes them.

use crate::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{self, File, OpenOptions};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

const PART_SUFFIX: &str = ".part";
const WORKSPACE_PREFIX: &str = ".chunkdl-";

/// Totals of a finished reassembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Assembled {
    /// Number of chunks concatenated into the output
    pub chunks: u64,
    /// Number of bytes written to the output
    pub bytes: u64,
}

/// Write-once chunk storage keyed by a zero-based identifier
#[derive(Debug)]
pub struct ChunkStore {
    dir: PathBuf,
    prefix: String,
    next_id: AtomicU64,
    // removed together with whatever it still holds when the store is dropped
    _workspace: Option<TempDir>,
}

impl ChunkStore {
    /// Prepare a store in `dir`, removing entries an aborted run left behind
    ///
    /// A stale entry would be kept by the idempotent [`put`][ChunkStore::put]
    /// and end up in the output, so they are cleared before any chunk is written.
    #[instrument(skip(dir), fields(dir = %dir.as_ref().display()))]
    pub async fn open(dir: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(|source| Error::StoreInit {
            path: dir.clone(),
            source,
        })?;
        let store = Self {
            dir,
            prefix: prefix.to_string(),
            next_id: AtomicU64::new(0),
            _workspace: None,
        };
        let removed = store.clear().await.map_err(|source| Error::StoreInit {
            path: store.dir.clone(),
            source,
        })?;
        if removed > 0 {
            warn!("Removed {} stale chunk entries", removed);
        }
        Ok(store)
    }

    /// Prepare a store in a fresh, uniquely named directory under `parent`
    ///
    /// Stores created this way never see each other's entries, so several
    /// transfers can share one `parent` and prefix. The directory is removed
    /// when the store is dropped.
    #[instrument(skip(parent), fields(parent = %parent.as_ref().display()))]
    pub async fn create_in(parent: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let parent = parent.as_ref().to_path_buf();
        let init_err = |source: io::Error| Error::StoreInit {
            path: parent.clone(),
            source,
        };
        fs::create_dir_all(&parent).await.map_err(init_err)?;
        let workspace = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&parent)
            .map_err(init_err)?;
        debug!("Chunk workspace {}", workspace.path().display());
        Ok(Self {
            dir: workspace.path().to_path_buf(),
            prefix: prefix.to_string(),
            next_id: AtomicU64::new(0),
            _workspace: Some(workspace),
        })
    }

    /// Location of the entry for chunk `id`
    pub fn path_for(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{}{}", self.prefix, id))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Claim the next chunk identifier
    ///
    /// Identifiers start at 0 and are never handed out twice, no matter how
    /// many tasks call this concurrently.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    #[cfg(test)]
    async fn contains(&self, id: u64) -> bool {
        fs::metadata(self.path_for(id)).await.is_ok()
    }

    /// Persist `data` as chunk `id`
    ///
    /// Storing an identifier that already has an entry does nothing. The
    /// bytes are written next to the entry and moved into place once flushed,
    /// so an entry is either complete or absent.
    #[instrument(skip(self, data), fields(len = data.len()))]
    pub async fn put(&self, id: u64, data: &[u8]) -> Result<()> {
        let path = self.path_for(id);
        if fs::metadata(&path).await.is_ok() {
            debug!("Chunk already stored, skipping");
            return Ok(());
        }
        let to_err = |source: io::Error| Error::StoreWriteFailed {
            id,
            path: path.clone(),
            source,
        };
        let part = part_path(&path);
        let mut file = File::create(&part).await.map_err(to_err)?;
        file.write_all(data).await.map_err(to_err)?;
        file.flush().await.map_err(to_err)?;
        file.sync_all().await.map_err(to_err)?;
        drop(file);
        fs::rename(&part, &path).await.map_err(to_err)?;
        debug!("Stored {} bytes", data.len());
        Ok(())
    }

    /// Concatenate the stored chunks into `output`, removing each one once copied
    ///
    /// Walks identifiers from 0 upwards and stops at the first one without an
    /// entry, so a missing chunk truncates the output at that point.
    #[instrument(skip(self, output), fields(output = %output.as_ref().display()))]
    pub async fn assemble(&self, output: impl AsRef<Path>) -> Result<Assembled> {
        let output = output.as_ref();
        let out_err = |source: io::Error| Error::AssembleFailed {
            path: output.to_path_buf(),
            source,
        };
        let mut out = File::create(output).await.map_err(out_err)?;
        let mut total = Assembled::default();
        for id in 0.. {
            let path = self.path_for(id);
            let read_err = |source: io::Error| Error::StoreReadFailed {
                id,
                path: path.clone(),
                source,
            };
            let mut chunk = match File::open(&path).await {
                Ok(f) => f,
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(read_err(e)),
            };
            let copied = copy_chunk(&mut chunk, &mut out).await.map_err(|e| match e {
                CopyError::Read(source) => read_err(source),
                CopyError::Write(source) => out_err(source),
            })?;
            drop(chunk);
            fs::remove_file(&path).await.map_err(read_err)?;
            debug!("Appended chunk {} ({} bytes)", id, copied);
            total.chunks += 1;
            total.bytes += copied;
        }
        out.flush().await.map_err(out_err)?;
        out.sync_all().await.map_err(out_err)?;
        info!("Assembled {} chunks, {} bytes", total.chunks, total.bytes);
        Ok(total)
    }

    /// Remove every entry (and unfinished write) belonging to this store
    ///
    /// Returns the number of removed files.
    pub async fn clear(&self) -> io::Result<u64> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let owned = name.to_str().map_or(false, |n| self.owns(n));
            if !owned {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    fn owns(&self, name: &str) -> bool {
        let rest = match name.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest,
            None => return false,
        };
        let id = rest.strip_suffix(PART_SUFFIX).unwrap_or(rest);
        !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

// tokio::io::copy can't tell a failed read from a failed write
async fn copy_chunk(from: &mut File, to: &mut File) -> std::result::Result<u64, CopyError> {
    use tokio::io::AsyncReadExt;

    let mut buf = vec![0u8; 64 * 1024];
    let mut copied = 0u64;
    loop {
        let n = from.read(&mut buf).await.map_err(CopyError::Read)?;
        if n == 0 {
            return Ok(copied);
        }
        to.write_all(&buf[..n]).await.map_err(CopyError::Write)?;
        copied += n as u64;
    }
}
