//! End-to-end orchestration of the stages.
//!
//! `ingest → clean → normalize` produce a [`StagedTable`]; date inference
//! and width profiling turn it into a [`PreparedTable`], which the loader
//! writes out. The date stage can be retried with another policy without
//! re-reading any file.

use std::path::PathBuf;

use chrono::Local;

use crate::{
    clean::{self, CleanReport},
    columns::{self, NormalizeOptions},
    dataset::Table,
    dates::{self, DatePolicy, DateReport},
    destination::{self, ColumnSpec, Destination},
    diagnostics::Diagnostics,
    error::{DateConversionError, PipelineError},
    ingest::{self, IngestReport, ReadOptions},
    loader::{self, CancelToken, ChunkResolver, LoadOptions, LoadSummary},
    profile::{self, WidthProfile},
};

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub read: ReadOptions,
    pub normalize: NormalizeOptions,
    pub date_policy: DatePolicy,
}

impl PipelineOptions {
    pub fn with_read(mut self, read: ReadOptions) -> Self {
        self.read = read;
        self
    }

    pub fn with_normalize(mut self, normalize: NormalizeOptions) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_date_policy(mut self, policy: DatePolicy) -> Self {
        self.date_policy = policy;
        self
    }
}

/// A table that has been read, cleaned and given canonical column names.
#[derive(Debug, Clone)]
pub struct StagedTable {
    pub table: Table,
    pub ingest: IngestReport,
    pub clean: CleanReport,
}

/// A table ready to be loaded: date-typed, profiled and planned.
#[derive(Debug, Clone)]
pub struct PreparedTable {
    pub table: Table,
    pub profile: WidthProfile,
    pub columns: Vec<ColumnSpec>,
    pub ingest: IngestReport,
    pub dates: DateReport,
}

/// Returned when the `raise` date policy rejects a value. The staged table
/// is handed back untouched so the date stage can be re-run.
#[derive(Debug)]
pub struct DateRejection {
    pub staged: StagedTable,
    pub error: DateConversionError,
}

impl From<DateRejection> for PipelineError {
    fn from(rejection: DateRejection) -> Self {
        PipelineError::DateConversion(rejection.error)
    }
}

/// Reads, cleans and normalizes every input file.
pub fn stage(
    paths: &[PathBuf],
    options: &PipelineOptions,
    diagnostics: &dyn Diagnostics,
) -> Result<StagedTable, PipelineError> {
    let (mut table, ingest) = ingest::ingest_files(paths, &options.read, diagnostics)?;
    let clean = clean::clean_table(&mut table, diagnostics);
    columns::normalize_headers(&mut table, options.normalize, diagnostics)?;
    Ok(StagedTable {
        table,
        ingest,
        clean,
    })
}

/// Runs date inference under `policy`, then width profiling.
pub fn retry_dates(
    staged: StagedTable,
    policy: DatePolicy,
    diagnostics: &dyn Diagnostics,
) -> Result<PreparedTable, DateRejection> {
    let StagedTable {
        mut table,
        ingest,
        clean,
    } = staged;
    let dates = match dates::infer_dates(&mut table, policy, diagnostics) {
        Ok(report) => report,
        Err(error) => {
            return Err(DateRejection {
                staged: StagedTable {
                    table,
                    ingest,
                    clean,
                },
                error,
            });
        }
    };
    let profile = profile::profile_widths(&mut table, diagnostics);
    let columns = destination::plan_columns(&table, &profile);
    Ok(PreparedTable {
        table,
        profile,
        columns,
        ingest,
        dates,
    })
}

/// Runs every computational stage with the configured date policy.
pub fn prepare(
    paths: &[PathBuf],
    options: &PipelineOptions,
    diagnostics: &dyn Diagnostics,
) -> Result<PreparedTable, PipelineError> {
    let staged = stage(paths, options, diagnostics)?;
    Ok(retry_dates(staged, options.date_policy, diagnostics)?)
}

/// Writes a prepared table to `destination`.
pub fn load<D>(
    prepared: &PreparedTable,
    destination: &mut D,
    options: &LoadOptions,
    resolver: &mut dyn ChunkResolver,
    cancel: &CancelToken,
    diagnostics: &dyn Diagnostics,
) -> Result<LoadSummary, PipelineError>
where
    D: Destination + ?Sized,
{
    Ok(loader::load_table(
        &prepared.table,
        &prepared.columns,
        destination,
        options,
        resolver,
        cancel,
        diagnostics,
    )?)
}

/// `tabular_load_YYYYMMDD_HHMMSS` in local time.
pub fn default_table_name() -> String {
    format!("tabular_load_{}", Local::now().format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_name_is_timestamped() {
        let name = default_table_name();
        let suffix = name.strip_prefix("tabular_load_").unwrap();
        assert_eq!(suffix.len(), 15);
        assert_eq!(&suffix[8..9], "_");
        assert!(suffix.replace('_', "").chars().all(|c| c.is_ascii_digit()));
    }
}
