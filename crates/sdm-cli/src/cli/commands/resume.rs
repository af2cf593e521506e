//! `sdm resume <hash>` – continue a persisted download.

use anyhow::{bail, Result};
use sdm_core::manager::Manager;

pub async fn run_resume(manager: &Manager, hash: &str) -> Result<()> {
    manager.resume_download(hash).await?;
    manager.wait(hash).await;
    let item = manager
        .get_item(hash)
        .ok_or_else(|| anyhow::anyhow!("item {hash} vanished"))?;
    if item.finished() {
        println!(
            "Done: {} ({} bytes)",
            item.absolute_location.display(),
            item.downloaded
        );
        Ok(())
    } else {
        bail!("download still incomplete; run `sdm resume {hash}` again");
    }
}
