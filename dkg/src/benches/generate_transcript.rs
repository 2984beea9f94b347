use crate::setup;
use criterion::{criterion_group, BatchSize, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn benchmark_generate_transcript(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    for &n in &[4u32, 16, 64] {
        let t = n * 2 / 3 + 1;
        let epoch = setup::epoch(n, t);
        c.bench_function(&format!("{}/n={} t={}", module_path!(), n, t), |b| {
            b.iter_batched(
                || epoch.sessions[0].clone(),
                |mut dkg| black_box(dkg.generate_transcript(&mut rng).unwrap()),
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = benchmark_generate_transcript
}
