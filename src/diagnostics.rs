//! Diagnostics sink injected into every pipeline stage.
//!
//! Stages report domain events as [`Notice`] values instead of writing to a
//! global logger. [`LogDiagnostics`] forwards them to the `log` facade;
//! [`CapturingDiagnostics`] keeps them in memory so tests can assert on them.

use std::{
    fmt,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use log::Level;

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    FileRead {
        path: PathBuf,
        rows: usize,
        columns: usize,
    },
    /// A file introduced a column no earlier file had.
    ColumnAdded {
        column: String,
        path: PathBuf,
    },
    CellsCleaned {
        blanked: usize,
        stripped: usize,
    },
    ColumnRenamed {
        from: String,
        to: String,
    },
    DateColumnConverted {
        column: String,
        converted: usize,
        failed: usize,
        is_date: bool,
    },
    WidthProfiled {
        column: String,
        width: usize,
    },
    ClobFallback {
        column: String,
        width: usize,
    },
    ChunkCommitted {
        chunk: usize,
        rows_written: usize,
        total_rows: usize,
        percent: f64,
    },
    ChunkFailed {
        chunk: usize,
        attempt: usize,
        remediation: String,
    },
}

impl Notice {
    pub fn level(&self) -> Level {
        match self {
            Notice::ColumnRenamed { .. } | Notice::WidthProfiled { .. } => Level::Debug,
            Notice::ColumnAdded { .. } | Notice::ClobFallback { .. } | Notice::ChunkFailed { .. } => {
                Level::Warn
            }
            Notice::DateColumnConverted { failed, .. } if *failed > 0 => Level::Warn,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::FileRead {
                path,
                rows,
                columns,
            } => write!(f, "Read {rows} row(s) across {columns} column(s) from {path:?}"),
            Notice::ColumnAdded { column, path } => {
                write!(f, "*** adding column '{column}' introduced by {path:?} ***")
            }
            Notice::CellsCleaned { blanked, stripped } => write!(
                f,
                "Cleaned cells: {blanked} blank value(s) nulled, {stripped} value(s) stripped of non-ASCII characters"
            ),
            Notice::ColumnRenamed { from, to } => write!(f, "Renamed column '{from}' -> '{to}'"),
            Notice::DateColumnConverted {
                column,
                converted,
                failed,
                is_date,
            } => write!(
                f,
                "Converted '{column}' to datetime: {converted} value(s) parsed, {failed} unparseable; date typed: {is_date}"
            ),
            Notice::WidthProfiled { column, width } => {
                write!(f, "Column '{column}' sized as varchar({width})")
            }
            Notice::ClobFallback { column, width } => write!(
                f,
                "Column '{column}' stays unbounded text: longest value is {width} characters"
            ),
            Notice::ChunkCommitted {
                chunk,
                rows_written,
                total_rows,
                percent,
            } => write!(
                f,
                "Committed chunk {chunk}: {rows_written}/{total_rows} row(s) loaded ({percent:.1}%)"
            ),
            Notice::ChunkFailed {
                chunk,
                attempt,
                remediation,
            } => write!(f, "Chunk {chunk} attempt {attempt} failed: {remediation}"),
        }
    }
}

pub trait Diagnostics: Send + Sync {
    fn notice(&self, notice: Notice);
}

/// Forwards notices to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn notice(&self, notice: Notice) {
        log::log!(notice.level(), "{notice}");
    }
}

/// Records every notice in memory.
#[derive(Debug, Default)]
pub struct CapturingDiagnostics {
    notices: Mutex<Vec<Notice>>,
}

impl CapturingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Diagnostics for CapturingDiagnostics {
    fn notice(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capturing_sink_keeps_notices_in_order() {
        let sink = CapturingDiagnostics::new();
        sink.notice(Notice::WidthProfiled {
            column: "a".to_string(),
            width: 3,
        });
        sink.notice(Notice::ClobFallback {
            column: "b".to_string(),
            width: 5000,
        });
        let notices = sink.take();
        assert_eq!(notices.len(), 2);
        assert!(matches!(notices[1], Notice::ClobFallback { width: 5000, .. }));
        assert!(sink.notices().is_empty());
    }

    #[test]
    fn failed_date_conversions_are_warnings() {
        let clean = Notice::DateColumnConverted {
            column: "dt".to_string(),
            converted: 4,
            failed: 0,
            is_date: true,
        };
        let lossy = Notice::DateColumnConverted {
            column: "dt".to_string(),
            converted: 3,
            failed: 1,
            is_date: true,
        };
        assert_eq!(clean.level(), Level::Info);
        assert_eq!(lossy.level(), Level::Warn);
    }

    #[test]
    fn progress_notice_reports_percent() {
        let notice = Notice::ChunkCommitted {
            chunk: 2,
            rows_written: 100_000,
            total_rows: 120_000,
            percent: 83.333,
        };
        assert_eq!(
            notice.to_string(),
            "Committed chunk 2: 100000/120000 row(s) loaded (83.3%)"
        );
    }
}
