use sdm_core::{config, logging};

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    let cfg = match config::load_or_init() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("sdm error: {:#}", err);
            std::process::exit(1);
        }
    };

    if logging::init(&cfg).is_err() {
        logging::init_stderr(&cfg);
    }

    if let Err(err) = CliCommand::run_from_args(cfg).await {
        eprintln!("sdm error: {:#}", err);
        std::process::exit(1);
    }
}
