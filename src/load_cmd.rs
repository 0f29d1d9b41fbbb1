use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::LoadArgs,
    config,
    destination::{Destination, MemoryDestination, SqliteDestination},
    diagnostics::LogDiagnostics,
    loader::CancelToken,
    pipeline,
};

pub fn execute(args: &LoadArgs) -> Result<()> {
    let run = config::load_run_config(&args.input)?;
    let paths = config::resolve_paths(&args.input, &run)?;
    let options = config::pipeline_options(&args.input, &run)?;
    let load_options = config::load_options(args, &run);
    let mut retry = config::retry_policy(args, &run);
    let diagnostics = LogDiagnostics;

    info!(
        "Preparing {} file(s) for table '{}' (date policy {:?})",
        paths.len(),
        load_options.table_name,
        options.date_policy
    );
    let prepared =
        pipeline::prepare(&paths, &options, &diagnostics).context("Preparing input files")?;

    let mut destination: Box<dyn Destination> = if args.dry_run {
        info!("Dry run: rows are loaded into memory only");
        Box::new(MemoryDestination::new())
    } else {
        let database = config::database_path(args, &run)?;
        info!("Opening SQLite database {database:?}");
        Box::new(
            SqliteDestination::open(&database)
                .with_context(|| format!("Opening database {database:?}"))?,
        )
    };

    let summary = pipeline::load(
        &prepared,
        &mut destination,
        &load_options,
        &mut retry,
        &CancelToken::new(),
        &diagnostics,
    )
    .with_context(|| format!("Loading table '{}'", load_options.table_name))?;
    info!(
        "Loaded {} row(s) across {} column(s) into '{}' in {} chunk(s)",
        summary.rows_written,
        prepared.columns.len(),
        summary.table_name,
        summary.chunks.len()
    );
    Ok(())
}
