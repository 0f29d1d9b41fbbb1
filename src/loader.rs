//! Chunked, resumable batch loading.
//!
//! Rows are written in fixed-size chunks, strictly in order and one at a
//! time. A failed chunk is classified, described, and handed to a
//! [`ChunkResolver`] which decides whether the same chunk is attempted again
//! or the load stops. Committed chunks are never revisited and a failing
//! chunk is never skipped.

use std::{
    ops::Range,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::debug;

use crate::{
    dataset::Table,
    destination::{ChunkWrite, ColumnSpec, ConflictMode, Destination},
    diagnostics::{Diagnostics, Notice},
    error::{DestinationError, LoadError},
};

pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    RetryWait,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    ValueTooLong,
    TypeMismatch,
    Unrecognized,
}

impl FailureKind {
    pub fn of(error: &DestinationError) -> Self {
        match error {
            DestinationError::Transport { .. } => FailureKind::Transport,
            DestinationError::ValueTooLong { .. } => FailureKind::ValueTooLong,
            DestinationError::TypeMismatch { .. } => FailureKind::TypeMismatch,
            DestinationError::Other { .. } => FailureKind::Unrecognized,
        }
    }
}

/// Everything a resolver needs to decide what to do with a failed chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkFailure {
    /// 1-based chunk number.
    pub chunk: usize,
    pub rows: Range<usize>,
    /// 1-based attempt number for this chunk.
    pub attempt: usize,
    pub kind: FailureKind,
    pub remediation: String,
    pub error: DestinationError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Write the same chunk again.
    Retry,
    Abort,
}

pub trait ChunkResolver {
    fn resolve(&mut self, failure: &ChunkFailure) -> Resolution;
}

impl<F> ChunkResolver for F
where
    F: FnMut(&ChunkFailure) -> Resolution,
{
    fn resolve(&mut self, failure: &ChunkFailure) -> Resolution {
        self(failure)
    }
}

/// Stops at the first failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortOnFailure;

impl ChunkResolver for AbortOnFailure {
    fn resolve(&mut self, _failure: &ChunkFailure) -> Resolution {
        Resolution::Abort
    }
}

/// Retries transport failures a bounded number of times, sleeping `delay`
/// before each retry. Data failures abort, since retrying the same rows
/// cannot succeed without an operator changing something.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl ChunkResolver for RetryPolicy {
    fn resolve(&mut self, failure: &ChunkFailure) -> Resolution {
        if failure.kind == FailureKind::Transport && failure.attempt <= self.max_retries {
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            Resolution::Retry
        } else {
            Resolution::Abort
        }
    }
}

/// Shared flag for stopping a load between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub table_name: String,
    pub mode: ConflictMode,
    pub chunk_size: usize,
}

impl LoadOptions {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            mode: ConflictMode::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_mode(mut self, mode: ConflictMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub chunk: usize,
    pub rows: Range<usize>,
    pub attempts: usize,
    pub state: ChunkState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub table_name: String,
    pub rows_written: usize,
    pub chunks: Vec<ChunkOutcome>,
}

/// Splits `row_count` rows into consecutive windows of at most `chunk_size`.
///
/// An empty table still yields one empty chunk so the destination table is
/// created.
pub fn plan_chunks(row_count: usize, chunk_size: usize) -> Result<Vec<Range<usize>>, LoadError> {
    if chunk_size == 0 {
        return Err(LoadError::InvalidChunkSize);
    }
    if row_count == 0 {
        return Ok(vec![0..0]);
    }
    Ok((0..row_count)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(row_count))
        .collect())
}

/// Describes what an operator would need to change for `error` to go away.
pub fn remediation(error: &DestinationError, table: &Table, rows: &Range<usize>) -> String {
    match error {
        DestinationError::Transport { message } => {
            format!("connection to the destination failed ({message}); check it and retry the chunk")
        }
        DestinationError::ValueTooLong {
            column: Some(column),
            width,
            ..
        } => {
            let longest = table
                .position(column)
                .and_then(|position| table.columns()[position].cells.get(rows.clone()))
                .and_then(|cells| cells.iter().map(|cell| cell.text_len()).max())
                .unwrap_or(0);
            match width {
                Some(width) => format!(
                    "column '{column}' holds a value of {longest} character(s) but is sized for {width}; widen it to at least {longest} and retry"
                ),
                None => format!(
                    "column '{column}' holds a value of {longest} character(s) that does not fit; widen it and retry"
                ),
            }
        }
        DestinationError::ValueTooLong { message, .. } => {
            format!("a value is too long for its column ({message}); widen the column and retry")
        }
        DestinationError::TypeMismatch {
            column: Some(column),
            expected,
            ..
        } => format!(
            "column '{column}' holds a value that is not a valid {}; fix the column type or the data and retry",
            expected.as_deref().unwrap_or("value for its type")
        ),
        DestinationError::TypeMismatch { message, .. } => {
            format!("a value does not match its column type ({message}); fix it and retry")
        }
        DestinationError::Other { message } => {
            format!("unrecognized destination error: {message}")
        }
    }
}

/// Writes every row of `table` to `destination`.
///
/// The first chunk uses `options.mode`; later chunks always append, so the
/// destination table is created at most once. `cancel` is checked before
/// every attempt; a cancelled or aborted load leaves committed chunks in
/// place.
pub fn load_table<D>(
    table: &Table,
    columns: &[ColumnSpec],
    destination: &mut D,
    options: &LoadOptions,
    resolver: &mut dyn ChunkResolver,
    cancel: &CancelToken,
    diagnostics: &dyn Diagnostics,
) -> Result<LoadSummary, LoadError>
where
    D: Destination + ?Sized,
{
    let plan = plan_chunks(table.row_count(), options.chunk_size)?;
    let total_rows = table.row_count();
    let mut summary = LoadSummary {
        table_name: options.table_name.clone(),
        ..LoadSummary::default()
    };

    for (offset, rows) in plan.into_iter().enumerate() {
        let chunk = offset + 1;
        let mode = if offset == 0 {
            options.mode
        } else {
            ConflictMode::Append
        };
        let request = ChunkWrite {
            table_name: &options.table_name,
            columns,
            mode,
            index: chunk,
            table,
            rows: rows.clone(),
        };

        let mut attempt = 0;
        let mut state = ChunkState::Pending;
        loop {
            debug!("Chunk {chunk} ({rows:?}) is {state:?}");
            if cancel.is_cancelled() {
                return Err(LoadError::Cancelled {
                    next_chunk: chunk,
                    committed_rows: summary.rows_written,
                });
            }
            attempt += 1;
            match destination.write_chunk(&request) {
                Ok(()) => {
                    state = ChunkState::Committed;
                    debug!("Chunk {chunk} ({rows:?}) is {state:?} after {attempt} attempt(s)");
                    summary.rows_written += rows.len();
                    diagnostics.notice(Notice::ChunkCommitted {
                        chunk,
                        rows_written: summary.rows_written,
                        total_rows,
                        percent: percent(summary.rows_written, total_rows),
                    });
                    summary.chunks.push(ChunkOutcome {
                        chunk,
                        rows: rows.clone(),
                        attempts: attempt,
                        state,
                    });
                    break;
                }
                Err(error) => {
                    let failure = ChunkFailure {
                        chunk,
                        rows: rows.clone(),
                        attempt,
                        kind: FailureKind::of(&error),
                        remediation: remediation(&error, table, &rows),
                        error,
                    };
                    diagnostics.notice(Notice::ChunkFailed {
                        chunk,
                        attempt,
                        remediation: failure.remediation.clone(),
                    });
                    state = ChunkState::RetryWait;
                    if resolver.resolve(&failure) == Resolution::Abort {
                        debug!("Chunk {chunk} ({rows:?}) is {:?}", ChunkState::Aborted);
                        return Err(LoadError::Aborted {
                            chunk,
                            rows,
                            committed_rows: summary.rows_written,
                            cause: failure.error,
                        });
                    }
                }
            }
        }
    }
    Ok(summary)
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 * 100.0 / total as f64
    }
}
