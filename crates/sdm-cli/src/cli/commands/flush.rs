//! `sdm flush [hash]` – drop finished and parked downloads.

use anyhow::Result;
use sdm_core::manager::Manager;

pub fn run_flush(manager: &Manager, hash: Option<&str>) -> Result<()> {
    match hash {
        Some(hash) => {
            manager.flush_one(hash)?;
            println!("Flushed {hash}.");
        }
        None => {
            let before = manager.list().len();
            manager.flush()?;
            let after = manager.list().len();
            println!("Flushed {} download(s).", before.saturating_sub(after));
        }
    }
    Ok(())
}
