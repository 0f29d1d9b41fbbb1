use tabular_load::{
    data::Cell,
    dataset::{Column, Table},
    destination::{ChunkWrite, ColumnSpec, ConflictMode, Destination, MemoryDestination, SqlType},
    diagnostics::{CapturingDiagnostics, Notice},
    error::{DestinationError, LoadError},
    loader::{
        self, AbortOnFailure, CancelToken, ChunkFailure, FailureKind, LoadOptions, Resolution,
    },
};

fn numbered(rows: usize) -> (Table, Vec<ColumnSpec>) {
    let cells = (0..rows).map(|i| Cell::text(i.to_string())).collect();
    let table = Table::from_columns(vec![Column::new("id", cells)]).unwrap();
    let columns = vec![ColumnSpec {
        name: "id".to_string(),
        sql_type: SqlType::Varchar(rows.to_string().len()),
    }];
    (table, columns)
}

fn transport() -> DestinationError {
    DestinationError::Transport {
        message: "connection reset by peer".to_string(),
    }
}

#[test]
fn large_table_is_committed_in_three_ordered_chunks() {
    let (table, columns) = numbered(120_000);
    let mut dest = MemoryDestination::new();
    let sink = CapturingDiagnostics::new();
    let summary = loader::load_table(
        &table,
        &columns,
        &mut dest,
        &LoadOptions::new("big"),
        &mut AbortOnFailure,
        &CancelToken::new(),
        &sink,
    )
    .unwrap();

    let sizes: Vec<usize> = summary.chunks.iter().map(|c| c.rows.len()).collect();
    assert_eq!(sizes, vec![50_000, 50_000, 20_000]);
    assert_eq!(dest.attempted_chunks(), vec![1, 2, 3]);
    let stored = dest.table("big").unwrap();
    assert_eq!(stored.rows.len(), 120_000);
    assert_eq!(stored.rows[119_999][0], Cell::text("119999"));

    let progress: Vec<(usize, usize)> = sink
        .notices()
        .into_iter()
        .filter_map(|n| match n {
            Notice::ChunkCommitted {
                chunk,
                rows_written,
                ..
            } => Some((chunk, rows_written)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, 50_000), (2, 100_000), (3, 120_000)]);
}

#[test]
fn transport_failure_on_second_chunk_retries_only_that_chunk() {
    let (table, columns) = numbered(6);
    let mut dest = MemoryDestination::new();
    dest.fail_chunk(2, transport()).fail_chunk(2, transport());

    let mut seen: Vec<ChunkFailure> = Vec::new();
    let mut resolver = |failure: &ChunkFailure| {
        seen.push(failure.clone());
        Resolution::Retry
    };
    let summary = loader::load_table(
        &table,
        &columns,
        &mut dest,
        &LoadOptions::new("t").with_chunk_size(2),
        &mut resolver,
        &CancelToken::new(),
        &CapturingDiagnostics::new(),
    )
    .unwrap();

    assert_eq!(dest.attempted_chunks(), vec![1, 2, 2, 2, 3]);
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|f| f.chunk == 2 && f.rows == (2..4)));
    assert_eq!(seen[1].attempt, 2);
    assert_eq!(seen[0].kind, FailureKind::Transport);
    assert_eq!(summary.chunks[1].attempts, 3);
    let stored = dest.table("t").unwrap();
    let ids: Vec<String> = stored.rows.iter().map(|r| r[0].to_string()).collect();
    assert_eq!(ids, vec!["0", "1", "2", "3", "4", "5"]);
}

#[test]
fn abort_keeps_committed_chunks_and_reports_the_failed_range() {
    let (table, columns) = numbered(6);
    let mut dest = MemoryDestination::new();
    dest.fail_chunk(
        2,
        DestinationError::Other {
            message: "disk quota".to_string(),
        },
    );
    let sink = CapturingDiagnostics::new();
    let err = loader::load_table(
        &table,
        &columns,
        &mut dest,
        &LoadOptions::new("t").with_chunk_size(2),
        &mut AbortOnFailure,
        &CancelToken::new(),
        &sink,
    )
    .unwrap_err();

    match err {
        LoadError::Aborted {
            chunk,
            rows,
            committed_rows,
            ..
        } => {
            assert_eq!(chunk, 2);
            assert_eq!(rows, 2..4);
            assert_eq!(committed_rows, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(dest.table("t").unwrap().rows.len(), 2);
    assert!(sink.notices().iter().any(|n| matches!(
        n,
        Notice::ChunkFailed { chunk: 2, remediation, .. } if remediation.contains("disk quota")
    )));
}

#[test]
fn cancelling_while_a_chunk_waits_never_rewrites_it() {
    let (table, columns) = numbered(4);
    let mut dest = MemoryDestination::new();
    dest.fail_chunk(2, transport());
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let mut resolver = move |_: &ChunkFailure| {
        trigger.cancel();
        Resolution::Retry
    };
    let err = loader::load_table(
        &table,
        &columns,
        &mut dest,
        &LoadOptions::new("t").with_chunk_size(2),
        &mut resolver,
        &cancel,
        &CapturingDiagnostics::new(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        LoadError::Cancelled {
            next_chunk: 2,
            committed_rows: 2
        }
    ));
    assert_eq!(dest.attempted_chunks(), vec![1, 2]);
    assert_eq!(dest.table("t").unwrap().rows.len(), 2);
}

/// Cancels the load as soon as the first chunk is committed.
struct CancelAfterFirst {
    inner: MemoryDestination,
    cancel: CancelToken,
}

impl Destination for CancelAfterFirst {
    fn write_chunk(&mut self, chunk: &ChunkWrite<'_>) -> Result<(), DestinationError> {
        self.inner.write_chunk(chunk)?;
        self.cancel.cancel();
        Ok(())
    }
}

#[test]
fn cancelling_between_chunks_stops_before_the_next_write() {
    let (table, columns) = numbered(4);
    let cancel = CancelToken::new();
    let mut dest = CancelAfterFirst {
        inner: MemoryDestination::new(),
        cancel: cancel.clone(),
    };
    let err = loader::load_table(
        &table,
        &columns,
        &mut dest,
        &LoadOptions::new("t")
            .with_chunk_size(2)
            .with_mode(ConflictMode::Replace),
        &mut AbortOnFailure,
        &cancel,
        &CapturingDiagnostics::new(),
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::Cancelled { next_chunk: 2, .. }));
    assert_eq!(dest.inner.attempted_chunks(), vec![1]);
}

#[test]
fn value_too_long_is_described_with_the_required_width() {
    let table = Table::from_columns(vec![Column::new(
        "code",
        vec![Cell::text("ab"), Cell::text("abcdef")],
    )])
    .unwrap();
    let columns = vec![ColumnSpec {
        name: "code".to_string(),
        sql_type: SqlType::Varchar(2),
    }];
    let mut dest = MemoryDestination::new();
    let mut remediations = Vec::new();
    let mut resolver = |failure: &ChunkFailure| {
        remediations.push((failure.kind, failure.remediation.clone()));
        Resolution::Abort
    };
    let err = loader::load_table(
        &table,
        &columns,
        &mut dest,
        &LoadOptions::new("t"),
        &mut resolver,
        &CancelToken::new(),
        &CapturingDiagnostics::new(),
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::Aborted { chunk: 1, .. }));
    assert_eq!(remediations.len(), 1);
    assert_eq!(remediations[0].0, FailureKind::ValueTooLong);
    assert!(remediations[0].1.contains("'code'"));
    assert!(remediations[0].1.contains("at least 6"));
    assert!(dest.table("t").is_none());
}
