//! CLI for the SDM download manager.

mod commands;
mod progress;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sdm_core::config::{self, SdmConfig};
use sdm_core::manager::Manager;
use sdm_core::queue::Priority;
use std::sync::Arc;

use commands::{run_add, run_flush, run_resume, run_status};
use progress::LogHandlers;

/// Top-level CLI for the SDM download manager.
#[derive(Debug, Parser)]
#[command(name = "sdm")]
#[command(about = "SDM: segmented, resumable download manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Low,
    Normal,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(p: PriorityArg) -> Self {
        match p {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::High => Priority::High,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Register a URL and download it in the foreground.
    Add {
        /// Direct HTTP/HTTPS URL to download.
        url: String,
        /// Save under this name instead of the probed one.
        #[arg(long, short = 'O', value_name = "NAME")]
        output: Option<String>,
        /// Directory where the file will be saved (default: configured
        /// download dir, else the current directory).
        #[arg(long, value_name = "DIR")]
        download_dir: Option<std::path::PathBuf>,
        /// Queue priority when the concurrency cap is busy.
        #[arg(long, value_enum, default_value_t = PriorityArg::Normal)]
        priority: PriorityArg,
        /// Cap the number of segments (0 = adaptive).
        #[arg(long, value_name = "N")]
        max_segments: Option<usize>,
        /// Cap concurrent connections for this download.
        #[arg(long, value_name = "N")]
        max_connections: Option<usize>,
        /// Overwrite the destination file if it exists.
        #[arg(long)]
        overwrite: bool,
    },

    /// Resume a persisted download by its hash.
    Resume {
        /// Item hash (as printed by `sdm status`).
        hash: String,
    },

    /// Show all registered downloads.
    Status,

    /// Drop finished and parked downloads (or one, by hash).
    Flush {
        /// Item hash; omit to flush everything inactive.
        hash: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args(cfg: SdmConfig) -> Result<()> {
        let cli = Cli::parse();
        tracing::debug!("loaded config: {:?}", cfg);
        let state_dir = config::state_dir().context("resolve state dir")?;
        let manager = Manager::open(cfg, state_dir, Arc::new(LogHandlers))?;

        match cli.command {
            CliCommand::Add {
                url,
                output,
                download_dir,
                priority,
                max_segments,
                max_connections,
                overwrite,
            } => {
                run_add(
                    &manager,
                    &url,
                    output,
                    download_dir,
                    priority.into(),
                    max_segments,
                    max_connections,
                    overwrite,
                )
                .await?
            }
            CliCommand::Resume { hash } => run_resume(&manager, &hash).await?,
            CliCommand::Status => run_status(&manager)?,
            CliCommand::Flush { hash } => run_flush(&manager, hash.as_deref())?,
        }

        // Durable catalogue write on the way out.
        manager.close()?;
        Ok(())
    }
}
