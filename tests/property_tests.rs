#[cfg(test)]
mod property_tests {
    use ndarray::Array1;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tandem::actions::{clip_action, select_action};
    use tandem::learner::EpochCounters;
    use tandem::replay_buffer::{ExperienceBuffer, Transition};

    fn action_strategy() -> impl Strategy<Value = Array1<f32>> {
        prop::collection::vec(any::<f32>(), 1..8).prop_map(Array1::from_vec)
    }

    #[derive(Clone, Copy, Debug)]
    enum Event {
        ValueFinishes,
        PolicyFinishes,
        Poll,
    }

    fn event_strategy() -> impl Strategy<Value = Event> {
        prop_oneof![Just(Event::ValueFinishes), Just(Event::PolicyFinishes), Just(Event::Poll)]
    }

    proptest! {
        #[test]
        fn test_buffer_never_exceeds_capacity(capacity in 1usize..20, inserts in 0usize..100, seed in any::<u64>()) {
            let buffer = ExperienceBuffer::new(capacity).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            for i in 0..inserts {
                let t = Transition::new(Array1::from_elem(1, i as f32), Array1::zeros(1), Array1::zeros(1), 0.0);
                buffer.insert_with_rng(t, &mut rng);
                prop_assert!(buffer.len() <= capacity);
                prop_assert_eq!(buffer.len(), (i + 1).min(capacity));
            }
        }

        #[test]
        fn test_clipped_actions_in_range(mut action in action_strategy()) {
            clip_action(&mut action);
            prop_assert!(action.iter().all(|v| (-1.0..=1.0).contains(v)));
        }

        #[test]
        fn test_selected_actions_in_range(
            proposal in action_strategy(),
            epsilon in 0.0f32..=1.0,
            trusted in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let dim = proposal.len();
            let (action, _) = select_action(proposal, epsilon, trusted, &mut rng);
            prop_assert_eq!(action.len(), dim);
            prop_assert!(action.iter().all(|v| (-1.0..=1.0).contains(v)));
        }

        #[test]
        fn test_epoch_gating_invariant(events in prop::collection::vec(event_strategy(), 0..200)) {
            let mut epochs = EpochCounters::new();
            let mut value_running = false;
            let mut policy_running = false;
            let mut value_held = false;
            let mut policy_held = false;

            for event in events {
                match event {
                    Event::ValueFinishes if value_running => {
                        value_running = false;
                        value_held = true;
                    }
                    Event::PolicyFinishes if policy_running => {
                        policy_running = false;
                        policy_held = true;
                    }
                    _ => {}
                }

                // one tick of the loop's bookkeeping
                if !value_running {
                    if value_held && epochs.value_import_allowed() {
                        epochs.advance_value();
                        value_held = false;
                    }
                    if !value_held && epochs.value_training_allowed() {
                        value_running = true;
                    }
                }
                if !policy_running {
                    if policy_held && epochs.policy_import_allowed() {
                        epochs.advance_policy();
                        policy_held = false;
                    }
                    if !policy_held && epochs.policy_training_allowed() {
                        policy_running = true;
                    }
                }
                prop_assert!(epochs.invariant_holds(), "{:?}", epochs);
            }
        }
    }

    #[test]
    fn test_gating_makes_progress() {
        let mut epochs = EpochCounters::new();
        for _ in 0..5 {
            assert!(epochs.value_training_allowed());
            assert!(epochs.value_import_allowed());
            epochs.advance_value();
            assert!(epochs.policy_training_allowed());
            assert!(epochs.policy_import_allowed());
            epochs.advance_policy();
        }
        assert_eq!(epochs, EpochCounters { q_epoch: 5, policy_epoch: 5 });
    }
}
