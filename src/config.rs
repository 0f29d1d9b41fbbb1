//! YAML run files and their merge with command-line flags.
//!
//! Every field is optional. Relative paths are resolved against the
//! directory holding the run file.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::Deserialize;

use crate::{
    cli::{InputArgs, LoadArgs},
    columns::NormalizeOptions,
    dates::DatePolicy,
    destination::ConflictMode,
    discover,
    ingest::ReadOptions,
    io_utils::{self, DEFAULT_QUOTE, Separator},
    loader::{LoadOptions, RetryPolicy},
    pipeline::{self, PipelineOptions},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub inputs: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
    pub delimiter: Option<String>,
    pub encoding: Option<String>,
    pub quote: Option<char>,
    pub quoting: Option<bool>,
    pub collapse_underscores: Option<bool>,
    pub date_policy: Option<DatePolicy>,
    pub null_values: Option<Vec<String>>,
    pub database: Option<PathBuf>,
    pub table: Option<String>,
    pub mode: Option<ConflictMode>,
    pub chunk_size: Option<usize>,
    pub max_retries: Option<usize>,
    pub retry_delay_ms: Option<u64>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Opening run file {path:?}"))?;
        let mut config: RunConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing run file {path:?}"))?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.inputs.iter_mut().for_each(join);
        self.dirs.iter_mut().for_each(join);
        self.database.iter_mut().for_each(join);
    }
}

/// Loads the run file named by `--config`, or an empty one.
pub fn load_run_config(args: &InputArgs) -> Result<RunConfig> {
    match &args.config {
        Some(path) => {
            debug!("Reading run file {path:?}");
            RunConfig::load(path)
        }
        None => Ok(RunConfig::default()),
    }
}

/// Input files in read order, discovered from flags or the run file.
pub fn resolve_paths(args: &InputArgs, config: &RunConfig) -> Result<Vec<PathBuf>> {
    let (files, dirs) = if args.inputs.is_empty() && args.dirs.is_empty() {
        (&config.inputs, &config.dirs)
    } else {
        (&args.inputs, &args.dirs)
    };
    discover::discover_inputs(files, dirs).context("Collecting input files")
}

pub fn pipeline_options(args: &InputArgs, config: &RunConfig) -> Result<PipelineOptions> {
    let mut read = ReadOptions::default();

    let separator = match (&args.delimiter, &config.delimiter) {
        (Some(separator), _) => Some(separator.clone()),
        (None, Some(raw)) => Some(Separator::parse(raw).map_err(|err| anyhow!(err))?),
        (None, None) => None,
    };
    if let Some(separator) = separator {
        read = read.with_separator(separator);
    }

    let label = args.input_encoding.as_deref().or(config.encoding.as_deref());
    read = read.with_encoding(io_utils::resolve_encoding(label)?);

    let quoting = !args.no_quoting && config.quoting.unwrap_or(true);
    let quote = if quoting {
        match args.quote.or(config.quote) {
            Some(ch) if ch.is_ascii() => Some(ch as u8),
            Some(ch) => return Err(anyhow!("Quote character '{ch}' must be ASCII")),
            None => Some(DEFAULT_QUOTE),
        }
    } else {
        None
    };
    read = read.with_quote(quote);

    if !args.null_values.is_empty() {
        read = read.with_null_values(args.null_values.clone());
    } else if let Some(values) = &config.null_values {
        read = read.with_null_values(values.clone());
    }

    let normalize = NormalizeOptions {
        collapse_underscores: args.collapse_underscores
            || config.collapse_underscores.unwrap_or(false),
    };
    let date_policy = args
        .date_policy
        .or(config.date_policy)
        .unwrap_or_default();

    Ok(PipelineOptions::default()
        .with_read(read)
        .with_normalize(normalize)
        .with_date_policy(date_policy))
}

pub fn load_options(args: &LoadArgs, config: &RunConfig) -> LoadOptions {
    let table = args
        .table
        .clone()
        .or_else(|| config.table.clone())
        .unwrap_or_else(pipeline::default_table_name);
    let mut options =
        LoadOptions::new(table).with_mode(args.mode.or(config.mode).unwrap_or_default());
    if let Some(chunk_size) = args.chunk_size.or(config.chunk_size) {
        options = options.with_chunk_size(chunk_size);
    }
    options
}

pub fn retry_policy(args: &LoadArgs, config: &RunConfig) -> RetryPolicy {
    let defaults = RetryPolicy::default();
    RetryPolicy {
        max_retries: args
            .max_retries
            .or(config.max_retries)
            .unwrap_or(defaults.max_retries),
        delay: args
            .retry_delay_ms
            .or(config.retry_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.delay),
    }
}

pub fn database_path(args: &LoadArgs, config: &RunConfig) -> Result<PathBuf> {
    args.database
        .clone()
        .or_else(|| config.database.clone())
        .ok_or_else(|| anyhow!("No database given; pass --database or set `database` in the run file"))
}
