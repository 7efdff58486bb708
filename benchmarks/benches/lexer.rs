//! Benchmarks du lexer Kyra (Criterion)
//!
//! Paramètres via env :
//!   - CRIT_SAMPLES    (def=60)   — taille d'échantillon Criterion
//!   - CRIT_WARMUP_MS  (def=300)  — warmup en ms
//!   - CRIT_MEASURE_MS (def=1000) — fenêtre de mesure en ms
//!   - BENCH_LARGE     (def=1)    — 0 pour désactiver la suite « large »
//!
//! Suites :
//!   1) micro     — petits programmes embarqués (variété de tokens)
//!   2) synthetic — sources générées, tailles [1, 4, 16, 64] KiB
//!   3) large     — 256 KiB (désactivable)

use std::{fmt::Write as _, time::Duration};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use kyra_lexer::Lexer;

// ─── Helpers env ─────────────────────────────────────────────────────────────

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(default)
}
fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(default)
}
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u8>().ok())
        .map(|v| v != 0)
        .unwrap_or(default)
}

// ─── Corpus ──────────────────────────────────────────────────────────────────

const MICRO: &[(&str, &str)] = &[
    ("oneliner", "func add(a, b) = a + b\n"),
    ("strings", "let banner = \"kyra bytecode toolchain\"\nlet empty = \"\"\n"),
    (
        "indent",
        "def count(n):\n    let acc = 0\n    for k n:\n        acc = acc + k\n    return acc\n",
    ),
    (
        "braces",
        "func poll(n) {\n    let t = 0\n    while t < n {\n        t = t + 1\n    }\n    return t\n}\n",
    ),
];

/// Source synthétique mélangeant les trois formes de fonction et les deux
/// styles de bloc, gonflée jusqu'à `kib` KiB.
fn synth_source(kib: usize) -> String {
    let target = kib * 1024;
    let mut src = String::with_capacity(target + 256);
    src.push_str("use sdt/math\n");
    let mut i = 0usize;
    while src.len() < target {
        let _ = write!(src, "func scale{i}(a, b) = a * {i} + b\n");
        let _ = write!(
            src,
            "def sum{i}(n):\n    let acc = 0\n    for k n:\n        acc = acc + k\n    return acc\n"
        );
        let _ = write!(
            src,
            "func poll{i}(n) {{\n    let t = 0\n    while t < n {{\n        t = t + 1\n    }}\n    return t\n}}\n"
        );
        let _ = write!(src, "let r{i} = scale{i}(2, 3) + sum{i}(4)\n");
        i += 1;
    }
    src
}

fn lex_count(src: &str) -> usize {
    Lexer::new(src).tokenize().expect("corpus must lex").len()
}

// ─── Suites ──────────────────────────────────────────────────────────────────

fn bench_lexer_micro(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer/micro");
    group.sample_size(env_usize("CRIT_SAMPLES", 60));
    group.warm_up_time(Duration::from_millis(env_u64("CRIT_WARMUP_MS", 300)));
    group.measurement_time(Duration::from_millis(env_u64("CRIT_MEASURE_MS", 1000)));

    for (name, src) in MICRO {
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), src, |b, s| {
            b.iter(|| black_box(lex_count(black_box(s))));
        });
    }
    group.finish();
}

fn bench_lexer_synthetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer/synthetic");
    group.sample_size(env_usize("CRIT_SAMPLES", 50));
    group.warm_up_time(Duration::from_millis(env_u64("CRIT_WARMUP_MS", 300)));
    group.measurement_time(Duration::from_millis(env_u64("CRIT_MEASURE_MS", 1200)));

    for kib in [1usize, 4, 16, 64] {
        let src = synth_source(kib);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{kib}KiB")), &src, |b, s| {
            b.iter(|| black_box(lex_count(black_box(s))));
        });
    }
    group.finish();
}

fn bench_lexer_large(c: &mut Criterion) {
    if !env_bool("BENCH_LARGE", true) {
        return;
    }
    let mut group = c.benchmark_group("lexer/large");
    group.sample_size(env_usize("CRIT_SAMPLES", 20));
    group.warm_up_time(Duration::from_millis(env_u64("CRIT_WARMUP_MS", 500)));
    group.measurement_time(Duration::from_millis(env_u64("CRIT_MEASURE_MS", 1500)));

    let src = synth_source(256);
    group.throughput(Throughput::Bytes(src.len() as u64));
    group.bench_with_input(BenchmarkId::from_parameter("256KiB"), &src, |b, s| {
        b.iter(|| black_box(lex_count(black_box(s))));
    });
    group.finish();
}

criterion_group!(benches, bench_lexer_micro, bench_lexer_synthetic, bench_lexer_large);
criterion_main!(benches);
