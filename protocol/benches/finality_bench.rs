// Artificial finality benchmarks.
//
// Covers curve evaluation, dry-run evaluation of competing candidates of
// increasing length, and full insertion of a canonical extension.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mess_protocol::chain::{Blockchain, ChainGenerator};
use mess_protocol::config::{ChainConfig, FinalityConfig, GENESIS_DIFFICULTY};
use mess_protocol::finality::{AntigravityCurve, CurveKind};
use mess_protocol::storage::{ChainDb, Header};

/// A gated chain with `len` canonical blocks at the target spacing.
fn setup_chain(len: usize) -> (Blockchain, Vec<Header>) {
    let db = Arc::new(ChainDb::open_temporary().unwrap());
    let config = ChainConfig {
        finality: FinalityConfig::enabled(),
        ..ChainConfig::default()
    };
    let chain = Blockchain::new(db, Header::genesis(0, GENESIS_DIFFICULTY), config).unwrap();
    let headers = ChainGenerator::default().generate_with_offset(chain.genesis(), len, 0);
    chain.insert_segment(&headers).unwrap();
    (chain, headers)
}

fn bench_curves(c: &mut Criterion) {
    for kind in [CurveKind::Sinusoidal, CurveKind::Exponential] {
        let curve = AntigravityCurve::default_for(kind);
        c.bench_function(&format!("finality/curve_{kind:?}").to_lowercase(), |b| {
            b.iter(|| curve.required_ratio(black_box(3_600.0)));
        });
    }
}

fn bench_evaluate_fork(c: &mut Criterion) {
    let (chain, canonical) = setup_chain(1_000);
    let generator = ChainGenerator::default();
    let mut group = c.benchmark_group("finality/evaluate_fork");

    for fork_len in [10usize, 100, 500] {
        let parent = &canonical[canonical.len() - fork_len - 1];
        let fork = generator.generate_with_offset(parent, fork_len, -9);

        group.throughput(Throughput::Elements(fork_len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fork_len), &fork, |b, fork| {
            b.iter(|| chain.evaluate_segment(fork).unwrap());
        });
    }

    group.finish();
}

fn bench_insert_extension(c: &mut Criterion) {
    let generator = ChainGenerator::default();

    c.bench_function("chain/insert_extension_100", |b| {
        b.iter_with_setup(
            || {
                let (chain, canonical) = setup_chain(100);
                let extension = generator.generate_with_offset(&canonical[99], 100, 0);
                (chain, extension)
            },
            |(chain, extension)| {
                chain.insert_segment(&extension).unwrap();
            },
        );
    });
}

criterion_group!(benches, bench_curves, bench_evaluate_fork, bench_insert_extension);
criterion_main!(benches);
