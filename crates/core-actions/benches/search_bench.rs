//! Chunk-crossing search and line addressing over an in-memory log.
//!
//! Run with: `cargo bench --package core-actions --bench search_bench`

use core_actions::{Direction, goto_line, search_str};
use core_config::Config;
use core_file::MemorySource;
use core_model::FileView;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

const FILE_SIZE: usize = 8 * 1024 * 1024;

fn log_bytes() -> Vec<u8> {
    let mut out = Vec::with_capacity(FILE_SIZE + 64);
    let mut i = 0u64;
    while out.len() < FILE_SIZE {
        out.extend_from_slice(format!("{i:08} INFO request served in {}ms\n", i % 97).as_bytes());
        i += 1;
    }
    out.extend_from_slice(b"99999999 ERROR disk full\n");
    out
}

fn open(bytes: &[u8], batch: u64) -> FileView {
    let mut cfg = Config::default();
    cfg.file.window.batch_size = batch;
    FileView::open(MemorySource::new("bench.log", bytes.to_vec()), cfg).unwrap()
}

fn bench_search(c: &mut Criterion) {
    let bytes = log_bytes();
    let mut group = c.benchmark_group("search_to_end");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.sample_size(10);
    for batch in [64 * 1024u64, 1024 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| {
                let mut view = open(&bytes, batch);
                black_box(search_str(&mut view, "ERROR", 1, Direction::Forward).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_goto_line(c: &mut Criterion) {
    let bytes = log_bytes();
    let mut group = c.benchmark_group("goto_line");
    group.sample_size(10);
    group.bench_function("last_from_start", |b| {
        b.iter(|| {
            let mut view = open(&bytes, 1024 * 1024);
            let lines = bytes.iter().filter(|&&b| b == b'\n').count() as i64;
            black_box(goto_line(&mut view, lines).unwrap())
        })
    });
    group.bench_function("last_from_end", |b| {
        b.iter(|| {
            let mut view = open(&bytes, 1024 * 1024);
            black_box(goto_line(&mut view, -1).unwrap())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_search, bench_goto_line);
criterion_main!(benches);
