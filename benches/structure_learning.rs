use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array2;

use bnstruct::config::{Algorithm, LearnerConfig};
use bnstruct::data::Dataset;
use bnstruct::learner::Learner;

/// A small synthetic chain a-b-c-d-e (each variable perfectly determined by its predecessor's
/// parity) plus `extra` pure-noise variables, so the benchmark scales with problem size without
/// needing a bundled dataset file.
fn chain_dataset(extra: usize, m: usize) -> Dataset {
    let n = 5 + extra;
    let mut raw = Array2::<u32>::zeros((n, m));
    for k in 0..m {
        let mut state = (k % 2) as u32;
        for v in 0..5 {
            raw[[v, k]] = state;
            state = (state + (k as u32 / (v as u32 + 2))) % 2;
        }
        for v in 5..n {
            raw[[v, k]] = ((k * (v + 1)) % 2) as u32;
        }
    }
    let names = (0..n).map(|v| format!("V{v}")).collect();
    Dataset::from_raw_columns(raw, names).unwrap()
}

fn learn_network(dataset: &Dataset, algorithm: Algorithm) {
    let config = LearnerConfig::new(algorithm, 0.05, None, dataset.n(), true, 1).unwrap();
    Learner::new(dataset, config).learn_network().unwrap();
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("learn_network");
    group.sample_size(10).measurement_time(Duration::from_secs(20));

    for (label, algorithm) in [
        ("gs", Algorithm::Gs),
        ("iamb", Algorithm::Iamb),
        ("mmpc", Algorithm::Mmpc),
        ("pc_stable", Algorithm::PcStable),
    ] {
        group.bench_function(label, |b| {
            b.iter_batched(
                || chain_dataset(5, 300),
                |dataset| learn_network(&dataset, algorithm),
                criterion::BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
