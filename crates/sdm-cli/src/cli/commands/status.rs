//! `sdm status` – show all registered downloads.

use anyhow::Result;
use sdm_core::manager::Manager;

pub fn run_status(manager: &Manager) -> Result<()> {
    let items = manager.list();
    if items.is_empty() {
        println!("No downloads registered.");
        return Ok(());
    }
    println!(
        "{:<34} {:<12} {:<14} {}",
        "HASH", "STATE", "PROGRESS", "NAME"
    );
    for item in items {
        let state = if manager.is_downloading(&item.hash) {
            "downloading"
        } else if item.finished() {
            "done"
        } else {
            "parked"
        };
        let progress = if item.total_size > 0 {
            format!("{}/{}", item.downloaded, item.total_size)
        } else {
            format!("{}/?", item.downloaded)
        };
        println!("{:<34} {:<12} {:<14} {}", item.hash, state, progress, item.name);
    }
    Ok(())
}
