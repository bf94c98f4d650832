use criterion::{black_box, criterion_group, criterion_main, Criterion};
use seamscan::{search, search_file, search_sequential, MatchAlgorithm, SearchConfig};
use std::{fs, num::NonZeroUsize};
use tempfile::tempdir;

fn create_corpus(lines: usize) -> Vec<u8> {
    let mut corpus = Vec::new();
    for i in 0..lines {
        corpus.extend_from_slice(
            format!(
                "Line {} TODO: fix bug {} FIXME: optimize line {} NOTE: important task {}\n",
                i, i, i, i
            )
            .as_bytes(),
        );
    }
    corpus
}

fn create_base_config(workers: usize) -> SearchConfig {
    SearchConfig {
        worker_count: NonZeroUsize::new(workers).unwrap(),
        ..SearchConfig::default()
    }
}

fn bench_worker_scaling(c: &mut Criterion) {
    let corpus = create_corpus(20_000);

    let mut group = c.benchmark_group("Worker Scaling");
    for workers in [1, 2, 4, 8] {
        let config = create_base_config(workers);
        group.bench_function(format!("workers_{}", workers), |b| {
            b.iter(|| black_box(search(&config, corpus.as_slice(), b"FIXME").unwrap()));
        });
    }
    group.finish();
}

fn bench_algorithms(c: &mut Criterion) {
    let corpus = create_corpus(20_000);
    let patterns: [&[u8]; 3] = [b"TODO", b"important task 1999", b"Line 19999 TODO"];

    let mut group = c.benchmark_group("Algorithms");
    for (i, pattern) in patterns.iter().enumerate() {
        for algorithm in [MatchAlgorithm::BruteForce, MatchAlgorithm::Kmp] {
            let mut config = create_base_config(4);
            config.algorithm = algorithm;
            group.bench_function(format!("{}_pattern_{}", algorithm, i), |b| {
                b.iter(|| black_box(search(&config, corpus.as_slice(), pattern).unwrap()));
            });
        }
    }
    group.finish();
}

fn bench_sequential_baseline(c: &mut Criterion) {
    let corpus = create_corpus(20_000);
    c.bench_function("sequential_baseline", |b| {
        b.iter(|| {
            black_box(search_sequential(&corpus, b"FIXME", MatchAlgorithm::BruteForce).unwrap())
        });
    });
}

fn bench_file_search(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corpus.txt");
    fs::write(&path, create_corpus(200_000)).unwrap();
    let config = create_base_config(4);

    c.bench_function("file_search", |b| {
        b.iter(|| black_box(search_file(&config, &path, b"NOTE").unwrap()));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = bench_worker_scaling, bench_algorithms,
              bench_sequential_baseline, bench_file_search
}

criterion_main!(benches);
