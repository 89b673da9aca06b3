//! Benchmark suite for worktrack.
//!
//! This module provides performance benchmarks for:
//! - Record parsing
//! - Validation with repair
//! - Registry rendering and loading a work units directory
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fs;
use tempfile::TempDir;

use worktrack::store::{load_all, FsStore};
use worktrack::testing::fixtures;
use worktrack::work_unit::{parse_record, Document, WorkUnitId};
use worktrack::{render_registry, validate_document, RegistryEntry};

// ============================================================================
// Helpers
// ============================================================================

/// A record with `tasks` tasks of four subtasks each, stored values left
/// stale so validation has work to do.
fn record_with_tasks(number: u32, tasks: usize) -> String {
    let id = WorkUnitId::from_parts("WU", number);
    let mut text = format!(
        "# Work Unit: Generated {n}\n\n## Metadata\n- **ID**: {id}\n- **Type**: Feature\n\
         - **Status**: In Progress\n- **Completion**: 10%\n- **Created**: 2026-01-05\n\
         - **Last Updated**: 2026-01-06\n\n## Description\nGenerated for benchmarks.\n\n\
         ## Requirements\n",
        n = number,
        id = id
    );
    for t in 1..=tasks {
        text.push_str(&format!(
            "\n### 1.{t} Task {t}\n- **Status**: In Progress\n- **Completion**: 0%\n\
             - **Implementation Details**:\n  - [✓] Design\n  - [~] Build\n  - [ ] Test\n  - [ ] Ship\n",
            t = t
        ));
    }
    text.push_str("\n## Changelog\n\n- **2026-01-05 09:00**: Work unit created\n");
    text
}

fn create_work_units_dir(count: u32) -> TempDir {
    let temp = TempDir::new().unwrap();
    for n in 1..=count {
        let name = format!("{}_generated.md", WorkUnitId::from_parts("WU", n));
        fs::write(temp.path().join(name), record_with_tasks(n, 5)).unwrap();
    }
    temp
}

// ============================================================================
// Parsing Benchmarks
// ============================================================================

fn bench_parse_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_record");

    group.bench_function("tasked_fixture", |b| {
        b.iter(|| black_box(parse_record(black_box(fixtures::TASKED_UNIT))))
    });

    for tasks in [5, 25, 100] {
        let text = record_with_tasks(1, tasks);
        group.throughput(Throughput::Elements(tasks as u64));
        group.bench_with_input(BenchmarkId::new("tasks", tasks), &text, |b, text| {
            b.iter(|| black_box(parse_record(black_box(text))))
        });
    }

    group.finish();
}

// ============================================================================
// Validation Benchmarks
// ============================================================================

fn bench_validate_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_document");

    let drifted = Document::parse(fixtures::DRIFTED_UNIT);
    group.bench_function("drifted_fix", |b| {
        b.iter(|| black_box(validate_document(black_box(&drifted), true, None)))
    });

    for tasks in [5, 25, 100] {
        let doc = Document::parse(&record_with_tasks(1, tasks));
        group.throughput(Throughput::Elements(tasks as u64));
        group.bench_with_input(BenchmarkId::new("check", tasks), &doc, |b, doc| {
            b.iter(|| black_box(validate_document(black_box(doc), false, None)))
        });
        group.bench_with_input(BenchmarkId::new("fix", tasks), &doc, |b, doc| {
            b.iter(|| black_box(validate_document(black_box(doc), true, None)))
        });
    }

    group.finish();
}

// ============================================================================
// Registry Benchmarks
// ============================================================================

fn bench_render_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_registry");
    let today = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();

    for count in [10, 100, 500] {
        let entries: Vec<RegistryEntry> = (1..=count)
            .map(|n| {
                let unit = parse_record(&record_with_tasks(n, 2)).unwrap();
                RegistryEntry::from_unit(&unit, format!("{}_generated.md", unit.id))
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("entries", count), &entries, |b, entries| {
            b.iter(|| black_box(render_registry(black_box(entries), today)))
        });
    }

    group.finish();
}

fn bench_load_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_all");

    for count in [10, 50, 200] {
        let temp = create_work_units_dir(count);
        let store = FsStore::new(temp.path());

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("records", count), &store, |b, store| {
            b.iter(|| black_box(load_all(black_box(store))))
        });
    }

    group.finish();
}

criterion_group!(parse_benches, bench_parse_record);

criterion_group!(validation_benches, bench_validate_document);

criterion_group!(registry_benches, bench_render_registry, bench_load_all);

criterion_main!(parse_benches, validation_benches, registry_benches);
