mod app;

use crate::app::App;
use anyhow::{bail, Result};
use chunkdl::Downloader;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let app: App = App::new();
    app.init_logging();
    let urls = app.urls().await?;
    let downloader = Downloader::new(app.config()?)?;

    let stop = downloader.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing chunks in flight");
            stop.stop();
        }
    });

    let mut failed = 0;
    for url in &urls {
        info!("Downloading {}", url);
        match downloader.download_to_dir(url, &app.output).await {
            Ok(done) => info!(
                "Saved {} ({} bytes, {} chunks, {} strategy)",
                done.path.display(),
                done.bytes,
                done.chunks,
                done.strategy
            ),
            Err(e) => {
                failed += 1;
                match e.chunk_id() {
                    Some(id) => error!("{}: {} failed at chunk {}: {}", url, e.stage(), id, e),
                    None => error!("{}: {} failed: {}", url, e.stage(), e),
                }
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} downloads failed", failed, urls.len());
    }
    Ok(())
}
