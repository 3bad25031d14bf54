//! Benchmarks for the hot paths of the learning cycle
//!
//! - insertion into a full experience buffer (random replacement)
//! - bootstrapped value targets over the candidate action set
//! - greedy action selection through the value model

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use tandem::actions::CandidateActions;
use tandem::dataset_builder::ValueTargets;
use tandem::estimator::ValueEstimator;
use tandem::replay_buffer::{ExperienceBuffer, Transition};

const STATE_DIM: usize = 4;
const ACTION_DIM: usize = 1;

fn random_transition(rng: &mut StdRng) -> Transition {
    let state = Array1::from_shape_fn(STATE_DIM, |_| rng.gen_range(-1.0..1.0));
    let action = Array1::from_shape_fn(ACTION_DIM, |_| rng.gen_range(-1.0..1.0));
    let next_state = Array1::from_shape_fn(STATE_DIM, |_| rng.gen_range(-1.0..1.0));
    Transition::new(state, action, next_state, rng.gen_range(-1.0..1.0))
}

fn filled_buffer(capacity: usize, rng: &mut StdRng) -> ExperienceBuffer {
    let buffer = ExperienceBuffer::new(capacity).expect("capacity is positive");
    for _ in 0..capacity {
        buffer.insert_with_rng(random_transition(rng), rng);
    }
    buffer
}

fn bench_buffer_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("Experience Buffer Insert");

    for capacity in [1_000usize, 100_000].iter() {
        let mut rng = StdRng::seed_from_u64(7);
        let buffer = filled_buffer(*capacity, &mut rng);
        let transition = random_transition(&mut rng);

        group.bench_with_input(BenchmarkId::new("full", capacity), &buffer, |b, buffer| {
            b.iter(|| buffer.insert_with_rng(black_box(transition.clone()), &mut rng));
        });
    }

    group.finish();
}

fn bench_value_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("Value Targets");
    let mut rng = StdRng::seed_from_u64(11);
    let buffer = Arc::new(filled_buffer(1_000, &mut rng));
    let value = Arc::new(ValueEstimator::with_architecture(STATE_DIM, ACTION_DIM, 20).expect("valid architecture"));

    for resolution in [3usize, 9, 33].iter() {
        let candidates = Arc::new(CandidateActions::new(ACTION_DIM, *resolution, 64, &mut rng));
        let mut targets = ValueTargets::new(buffer.clone(), value.clone(), candidates, 0.8);
        targets.set_epoch(1);
        let transition = random_transition(&mut rng);

        group.bench_with_input(BenchmarkId::new("bootstrap", resolution), &targets, |b, targets| {
            b.iter(|| targets.target(black_box(&transition)));
        });
    }

    group.finish();
}

fn bench_max_value(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(13);
    let value = ValueEstimator::with_architecture(STATE_DIM, ACTION_DIM, 20).expect("valid architecture");
    let candidates = CandidateActions::new(ACTION_DIM, 9, 64, &mut rng);
    let state = Array1::from_shape_fn(STATE_DIM, |_| rng.gen_range(-1.0..1.0));

    c.bench_function("max_value over 9 candidates", |b| {
        b.iter(|| value.max_value(black_box(state.view()), &candidates));
    });
}

criterion_group!(benches, bench_buffer_insert, bench_value_targets, bench_max_value);
criterion_main!(benches);
