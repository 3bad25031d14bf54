//! Cart-pole balancing with the actor/learner
//!
//! Trains a value/policy pair on the continuous cart-pole in the background.
//! Once both models have been trained twice the actor trusts the policy most
//! of the time. Artifacts are written every few minutes.
//!
//! Usage:
//!   cargo run --example cartpole [prefix]        train, saving to <prefix>
//!   cargo run --example cartpole use <prefix>    run a saved policy, no learning

use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};

use tandem::builders::LearnerBuilder;
use tandem::environments::CartPole;

const DEFAULT_PREFIX: &str = "rifl.dat";
const SAVE_INTERVAL: Duration = Duration::from_secs(180);
const REPORT_INTERVAL: Duration = Duration::from_secs(10);

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [mode, prefix] if mode == "use" => run_policy(prefix),
        [prefix] => train(prefix),
        [] => train(DEFAULT_PREFIX),
        _ => Err("usage: cartpole [prefix] | cartpole use <prefix>".into()),
    }
}

fn train(prefix: &str) -> Result<(), Box<dyn Error>> {
    let mut learner = LearnerBuilder::new()
        .environment(CartPole::new())
        .gamma(0.8)
        .epsilon(0.66)
        .build()?;

    learner.start()?;
    log::info!("training, artifacts go to {}", prefix);

    let mut last_save = Instant::now();
    let mut trusted = false;
    loop {
        thread::sleep(REPORT_INTERVAL);

        let stats = learner.statistics();
        log::info!(
            "ticks {} | buffer {} | q epoch {} | policy epoch {} | models {}",
            stats.ticks, stats.buffer_len, stats.q_epoch, stats.policy_epoch, stats.has_model
        );

        if !trusted && learner.has_model() >= 2 {
            learner.set_epsilon(0.95)?;
            trusted = true;
            log::info!("policy trained twice, epsilon raised to 0.95");
        }

        if last_save.elapsed() >= SAVE_INTERVAL {
            // A failed save is logged by the learner; training continues.
            let _ = learner.save(prefix);
            last_save = Instant::now();
        }
    }
}

fn run_policy(prefix: &str) -> Result<(), Box<dyn Error>> {
    let mut learner = LearnerBuilder::new()
        .environment(CartPole::new())
        .epsilon(1.0)
        .learning_mode(false)
        .build()?;
    learner.set_has_model(1);
    learner.load(prefix)?;
    learner.start()?;
    log::info!("running policy from {}", prefix);

    loop {
        thread::sleep(REPORT_INTERVAL);
        let stats = learner.statistics();
        log::info!("ticks {} | environment failures {}", stats.ticks, stats.environment_failures);
    }
}
