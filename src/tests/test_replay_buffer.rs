use std::sync::Arc;
use std::thread;

use ndarray::array;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::replay_buffer::{ExperienceBuffer, Transition};

fn transition(i: usize) -> Transition {
    Transition::new(array![i as f32], array![0.0], array![(i + 1) as f32], i as f32)
}

#[test]
fn test_buffer_add_and_sample() {
    let buffer = ExperienceBuffer::new(10).unwrap();
    buffer.insert(transition(1));
    assert_eq!(buffer.len(), 1);

    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(buffer.snapshot_sample(3, &mut rng), vec![transition(1); 3]);
}

#[test]
fn test_capacity_three_after_five_inserts() {
    let buffer = ExperienceBuffer::new(3).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    for i in 1..=5 {
        buffer.insert_with_rng(transition(i), &mut rng);
    }

    assert_eq!(buffer.len(), 3);
    let inserted: Vec<Transition> = (1..=5).map(transition).collect();
    for i in 0..3 {
        let present = buffer.get(i).unwrap();
        assert!(inserted.contains(&present));
    }
}

#[test]
fn test_fills_in_order_before_evicting() {
    let buffer = ExperienceBuffer::new(4).unwrap();
    for i in 0..4 {
        buffer.insert(transition(i));
    }
    for i in 0..4 {
        assert_eq!(buffer.get(i), Some(transition(i)));
    }
}

#[test]
fn test_eviction_is_not_fifo() {
    // With random replacement some early transition survives many inserts.
    let buffer = ExperienceBuffer::new(8).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    for i in 0..16 {
        buffer.insert_with_rng(transition(i), &mut rng);
    }
    let survivors = (0..8).filter(|&i| buffer.get(i).map_or(false, |t| t.reward < 8.0)).count();
    assert!(survivors > 0);
    assert_eq!(buffer.len(), 8);
}

#[test]
fn test_empty_buffer() {
    let buffer = ExperienceBuffer::new(10).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    assert!(buffer.is_empty());
    assert!(buffer.snapshot_sample(5, &mut rng).is_empty());
}

#[test]
fn test_snapshot_sample_does_not_remove() {
    let buffer = ExperienceBuffer::new(10).unwrap();
    for i in 0..3 {
        buffer.insert(transition(i));
    }
    let mut rng = StdRng::seed_from_u64(0);
    let sample = buffer.snapshot_sample(7, &mut rng);
    assert_eq!(sample.len(), 7);
    assert_eq!(buffer.len(), 3);
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(ExperienceBuffer::new(0).is_err());
}

#[test]
fn test_concurrent_inserts_respect_capacity() {
    let buffer = Arc::new(ExperienceBuffer::new(50).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for i in 0..100 {
                    buffer.insert(transition(t * 100 + i));
                    assert!(buffer.len() <= 50);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(buffer.len(), 50);
}
