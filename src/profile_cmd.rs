use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;

use crate::{
    cli::ProfileArgs,
    config,
    diagnostics::LogDiagnostics,
    pipeline,
    table::{self, Align},
};

pub fn execute(args: &ProfileArgs) -> Result<()> {
    let run = config::load_run_config(&args.input)?;
    let paths = config::resolve_paths(&args.input, &run)?;
    let options = config::pipeline_options(&args.input, &run)?;
    let prepared = pipeline::prepare(&paths, &options, &LogDiagnostics)
        .context("Preparing input files")?;

    let rows = prepared
        .columns
        .iter()
        .zip(prepared.table.columns())
        .map(|(spec, column)| {
            vec![
                spec.name.clone(),
                column.kind.to_string(),
                spec.sql_type.to_string(),
                column.non_null_count().to_string(),
                prepared
                    .profile
                    .width(&spec.name)
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(
        &["column", "kind", "type", "non_null", "width"],
        &[Align::Left, Align::Left, Align::Left, Align::Right, Align::Right],
        &rows,
    );

    let date_columns = prepared.dates.date_columns().join(", ");
    info!(
        "Profiled {} row(s) from {} file(s); date columns: {}",
        prepared.table.row_count(),
        prepared.ingest.files.len(),
        if date_columns.is_empty() {
            "none"
        } else {
            date_columns.as_str()
        }
    );
    if !prepared.profile.clob_columns.is_empty() {
        info!(
            "Unbounded text columns: {}",
            prepared
                .profile
                .clob_columns
                .iter()
                .map(|entry| format!("{} ({})", entry.column, entry.width))
                .join(", ")
        );
    }

    if let Some(output) = &args.output {
        prepared
            .profile
            .save(output)
            .with_context(|| format!("Writing width profile to {output:?}"))?;
        info!("Width profile written to {output:?}");
    }
    Ok(())
}
