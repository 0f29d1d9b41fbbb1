use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use tabular_load::dates::{self, DatePolicy};
use tabular_load::diagnostics::CapturingDiagnostics;
use tabular_load::pipeline::{self, PipelineOptions};
use tempfile::TempDir;

fn generate_orders(files: usize, rows: usize) -> (TempDir, Vec<PathBuf>) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut paths = Vec::with_capacity(files);
    for f in 0..files {
        let path = temp_dir.path().join(format!("orders_{f}.csv"));
        let mut file = BufWriter::new(File::create(&path).expect("create csv"));
        writeln!(file, "Order ID,Customer Name,Order Date,Status,Notes").expect("header");
        for i in 0..rows {
            let status = match i % 3 {
                0 => "shipped",
                1 => "pending",
                _ => "  ",
            };
            let day = (i % 28) + 1;
            writeln!(
                file,
                "{f}-{i},Customer {i},01/{day:02}/2024,{status},note for order {i} – café"
            )
            .expect("row");
        }
        file.flush().expect("flush csv");
        paths.push(path);
    }
    (temp_dir, paths)
}

fn bench_prepare(c: &mut Criterion) {
    let (temp_dir, paths) = generate_orders(4, 25_000);
    let options = PipelineOptions::default();

    let mut group = c.benchmark_group("prepare");

    group.bench_function("stage_only", |b| {
        b.iter(|| {
            pipeline::stage(&paths, &options, &CapturingDiagnostics::new()).expect("stage")
        });
    });

    let staged = pipeline::stage(&paths, &options, &CapturingDiagnostics::new()).expect("stage");
    group.bench_function("infer_dates", |b| {
        b.iter_batched(
            || staged.table.clone(),
            |mut table| {
                dates::infer_dates(&mut table, DatePolicy::Coerce, &CapturingDiagnostics::new())
                    .expect("dates")
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("full_prepare", |b| {
        b.iter(|| {
            pipeline::prepare(&paths, &options, &CapturingDiagnostics::new()).expect("prepare")
        });
    });

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_prepare);
criterion_main!(benches);
