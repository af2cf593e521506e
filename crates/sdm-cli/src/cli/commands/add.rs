//! `sdm add <url>` – register a download and run it to completion.

use anyhow::{bail, Result};
use sdm_core::manager::{AddOptions, Manager};
use sdm_core::queue::Priority;
use std::path::PathBuf;

#[allow(clippy::too_many_arguments)]
pub async fn run_add(
    manager: &Manager,
    url: &str,
    output: Option<String>,
    download_dir: Option<PathBuf>,
    priority: Priority,
    max_segments: Option<usize>,
    max_connections: Option<usize>,
    overwrite: bool,
) -> Result<()> {
    let opts = AddOptions {
        file_name: output,
        dir: download_dir,
        priority,
        max_segments,
        max_connections,
        overwrite,
        ..AddOptions::default()
    };
    let hash = manager.add_download(url, opts).await?;
    println!("Added {hash} for URL: {url}");

    manager.wait(&hash).await;
    let item = manager
        .get_item(&hash)
        .ok_or_else(|| anyhow::anyhow!("item {hash} vanished"))?;
    if item.finished() {
        println!(
            "Done: {} ({} bytes)",
            item.absolute_location.display(),
            item.downloaded
        );
        Ok(())
    } else if manager.waiting_count() > 0 && !manager.is_downloading(&hash) {
        println!("Queued behind {} download(s).", manager.waiting_count());
        Ok(())
    } else {
        bail!("download incomplete; run `sdm resume {hash}` to continue");
    }
}
