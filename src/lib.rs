pub mod clean;
pub mod cli;
pub mod columns;
pub mod config;
pub mod data;
pub mod dataset;
pub mod dates;
pub mod destination;
pub mod diagnostics;
pub mod discover;
pub mod error;
pub mod ingest;
pub mod io_utils;
pub mod load_cmd;
pub mod loader;
pub mod pipeline;
pub mod profile;
pub mod profile_cmd;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabular_load", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => load_cmd::execute(&args),
        Commands::Profile(args) => profile_cmd::execute(&args),
    }
}
