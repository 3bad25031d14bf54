//! Background dataset construction.
//!
//! A [`DatasetBuilder`] owns one worker thread per run. The worker takes one
//! sample of transitions from the experience buffer under a single lock,
//! turns them into rows through a [`SampleSource`] in parallel, and appends
//! them to a shared [`Dataset`]. The control loop never blocks on it: it polls
//! [`DatasetBuilder::is_completed`] once per tick.
//!
//! Cancellation is cooperative. [`DatasetBuilder::stop`] clears the running
//! flag and joins the worker; samples already being computed finish, the rest
//! are skipped, and the partial dataset is left for the caller to discard.

mod policy;
mod value;

pub use policy::PolicyInputs;
pub use value::ValueTargets;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ndarray::parallel::prelude::*;
use ndarray::Array1;
use parking_lot::Mutex;

use crate::dataset::Dataset;
use crate::error::{Result, TandemError};
use crate::replay_buffer::{ExperienceBuffer, Transition};

/// Turns sampled transitions into dataset rows.
pub trait SampleSource: Clone + Send + Sync + 'static {
    fn input_dim(&self) -> usize;

    /// Zero for input-only datasets.
    fn target_dim(&self) -> usize;

    /// Buffer the transitions are sampled from.
    fn buffer(&self) -> &ExperienceBuffer;

    /// The row for one transition. `None` skips it.
    fn row(&self, transition: &Transition) -> Option<(Array1<f32>, Option<Array1<f32>>)>;

    /// Called once on a fully built dataset before normalization is fitted.
    fn finished(&self, _dataset: &Dataset) {}
}

pub struct DatasetBuilder<S: SampleSource> {
    source: S,
    dataset: Arc<Mutex<Dataset>>,
    running: Arc<AtomicBool>,
    completed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<S: SampleSource> DatasetBuilder<S> {
    pub fn new(source: S) -> Self {
        let dataset = Dataset::new(source.input_dim(), source.target_dim());
        DatasetBuilder {
            source,
            dataset: Arc::new(Mutex::new(dataset)),
            running: Arc::new(AtomicBool::new(false)),
            completed: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Reconfigure the source between runs.
    pub fn source_mut(&mut self) -> Result<&mut S> {
        if self.is_running() {
            return Err(TandemError::AlreadyRunning("dataset builder".to_string()));
        }
        Ok(&mut self.source)
    }

    /// Begin building `size` rows in the background. The previous dataset is discarded.
    pub fn start(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(TandemError::invalid_parameter("size", "dataset size must be positive"));
        }
        if self.is_running() {
            return Err(TandemError::AlreadyRunning("dataset builder".to_string()));
        }
        self.join();

        self.dataset.lock().clear();
        self.completed.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        let source = self.source.clone();
        let dataset = Arc::clone(&self.dataset);
        let running = Arc::clone(&self.running);
        let completed = Arc::clone(&self.completed);

        self.handle = Some(thread::spawn(move || {
            build(&source, size, &dataset, &running);

            let mut dataset = dataset.lock();
            if running.load(Ordering::SeqCst) {
                source.finished(&dataset);
                if let Err(e) = dataset.fit_normalization() {
                    log::warn!("normalization fit failed, dataset left unnormalized: {}", e);
                }
                completed.store(true, Ordering::SeqCst);
            }
            running.store(false, Ordering::SeqCst);
        }));
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Request cancellation and wait for the worker to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Copy of the dataset in whatever state it is in.
    pub fn dataset(&self) -> Dataset {
        self.dataset.lock().clone()
    }

    /// The finished dataset, once. Clears the completed flag.
    pub fn take_dataset(&mut self) -> Option<Dataset> {
        if !self.is_completed() {
            return None;
        }
        self.join();
        self.completed.store(false, Ordering::SeqCst);
        let mut dataset = self.dataset.lock();
        let empty = Dataset::new(dataset.input_dim(), dataset.target_dim());
        Some(std::mem::replace(&mut *dataset, empty))
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("dataset builder thread panicked");
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }
}

impl<S: SampleSource> Drop for DatasetBuilder<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build<S: SampleSource>(source: &S, size: usize, dataset: &Mutex<Dataset>, running: &AtomicBool) {
    let transitions = source.buffer().snapshot_sample(size, &mut rand::thread_rng());
    transitions.par_iter().for_each(|transition| {
        if !running.load(Ordering::Relaxed) {
            return;
        }
        if let Some((input, target)) = source.row(transition) {
            if let Err(e) = dataset.lock().push(input, target) {
                log::warn!("dropping malformed sample: {}", e);
            }
        }
    });
}
