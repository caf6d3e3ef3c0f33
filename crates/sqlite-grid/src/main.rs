mod adapters;
mod cli;
mod core;
mod error;
mod logging;

use clap::Parser;

use crate::{cli::Args, core::config::GridConfig, error::AppResult};

fn main() -> AppResult<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let config = GridConfig::from_args(&args)?;
    tracing::info!(
        pk_prefix = %config.pk_prefix,
        default_page_size = config.default_page_size,
        max_page_size = config.max_page_size,
        "sqlite-grid bridge starting"
    );
    adapters::bridge::run(args, config)
}
