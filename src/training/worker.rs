use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::error::{Result, TandemError};
use crate::normalization::Preprocess;
use crate::training::{Solution, SolutionStatistics};

struct Progress<M> {
    statistics: Option<SolutionStatistics>,
    best: Option<Solution<M>>,
    finished: bool,
    /// The pass ended because of `stop`, not by converging or running out of iterations.
    cancelled: bool,
}

impl<M> Progress<M> {
    fn empty() -> Self {
        Progress { statistics: None, best: None, finished: false, cancelled: false }
    }
}

/// Thread and result bookkeeping shared by the optimizers.
pub struct OptimizerWorker<M> {
    name: &'static str,
    running: Arc<AtomicBool>,
    progress: Arc<Mutex<Progress<M>>>,
    handle: Option<JoinHandle<()>>,
}

/// Handle given to a running pass for publishing progress.
pub struct WorkerContext<M> {
    running: Arc<AtomicBool>,
    progress: Arc<Mutex<Progress<M>>>,
    preprocess: Preprocess,
}

impl<M: Clone + Send + 'static> OptimizerWorker<M> {
    pub fn new(name: &'static str) -> Self {
        OptimizerWorker {
            name,
            running: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(Mutex::new(Progress::empty())),
            handle: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run `job` on a new thread. Any untaken result of the previous pass is dropped.
    pub fn spawn<F>(&mut self, preprocess: Preprocess, job: F) -> Result<()>
    where
        F: FnOnce(&WorkerContext<M>) + Send + 'static,
    {
        if self.is_running() {
            return Err(TandemError::AlreadyRunning(format!("{} optimizer", self.name)));
        }
        self.join();
        *self.progress.lock() = Progress::empty();
        self.running.store(true, Ordering::SeqCst);

        let context = WorkerContext {
            running: Arc::clone(&self.running),
            progress: Arc::clone(&self.progress),
            preprocess,
        };
        let spawned = thread::Builder::new()
            .name(format!("{}-optimizer", self.name))
            .spawn(move || {
                job(&context);
                let stopped = !context.running.load(Ordering::SeqCst);
                let mut progress = context.progress.lock();
                progress.finished = true;
                if stopped {
                    progress.cancelled = true;
                    progress.best = None;
                }
                drop(progress);
                context.running.store(false, Ordering::SeqCst);
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(TandemError::Optimization(format!("cannot spawn {} optimizer: {}", self.name, e)))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn statistics(&self) -> Option<SolutionStatistics> {
        self.progress.lock().statistics.clone()
    }

    pub fn has_solution(&self) -> bool {
        if self.is_running() {
            return false;
        }
        let progress = self.progress.lock();
        progress.finished && !progress.cancelled && (progress.best.is_some() || faulted(&progress))
    }

    pub fn take_solution(&mut self) -> Result<Option<Solution<M>>> {
        if self.is_running() {
            return Ok(None);
        }
        self.join();
        let mut progress = self.progress.lock();
        if !progress.finished || progress.cancelled {
            return Ok(None);
        }
        if let Some(fault) = progress.statistics.as_ref().and_then(|s| s.fault.clone()) {
            progress.finished = false;
            progress.best = None;
            return Err(TandemError::Optimization(fault));
        }
        let solution = progress.best.take();
        if solution.is_some() {
            progress.finished = false;
        }
        Ok(solution)
    }

    /// Ask the pass to stop at the next iteration boundary and wait for it.
    /// A pass ended this way has no solution; a pass that had already
    /// finished keeps its result.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} optimizer thread panicked", self.name);
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }
}

impl<M> Drop for OptimizerWorker<M> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn faulted<M>(progress: &Progress<M>) -> bool {
    progress.statistics.as_ref().map_or(false, |s| s.fault.is_some())
}

impl<M: Clone> WorkerContext<M> {
    pub fn should_continue(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Record a completed iteration; `score` is the best score so far.
    pub fn report(&self, iterations: usize, score: f32) {
        self.progress.lock().statistics = Some(SolutionStatistics { score, iterations, fault: None });
    }

    /// Publish a new best model.
    pub fn offer(&self, model: &M, score: f32, iterations: usize) {
        let statistics = SolutionStatistics { score, iterations, fault: None };
        let mut progress = self.progress.lock();
        progress.statistics = Some(statistics.clone());
        progress.best = Some(Solution { model: model.clone(), preprocess: self.preprocess.clone(), statistics });
    }

    /// End the pass with a fault. Any best model is discarded.
    pub fn fail(&self, iterations: usize, reason: String) {
        let mut progress = self.progress.lock();
        let score = progress.statistics.as_ref().map_or(f32::NAN, |s| s.score);
        progress.statistics = Some(SolutionStatistics { score, iterations, fault: Some(reason) });
        progress.best = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_until_idle<M: Clone + Send + 'static>(worker: &OptimizerWorker<M>) {
        while worker.is_running() {
            thread::yield_now();
        }
    }

    #[test]
    fn test_best_offer_is_taken_once() {
        let mut worker: OptimizerWorker<u32> = OptimizerWorker::new("test");
        worker
            .spawn(Preprocess::identity(), |ctx| {
                ctx.offer(&1, 3.0, 1);
                ctx.offer(&2, 2.0, 2);
                ctx.report(3, 2.0);
            })
            .unwrap();
        wait_until_idle(&worker);

        assert!(worker.has_solution());
        let solution = worker.take_solution().unwrap().unwrap();
        assert_eq!(solution.model, 2);
        assert_eq!(solution.statistics.iterations, 2);
        assert!(!worker.has_solution());
        assert!(worker.take_solution().unwrap().is_none());
    }

    #[test]
    fn test_fault_surfaces_as_error() {
        let mut worker: OptimizerWorker<u32> = OptimizerWorker::new("test");
        worker
            .spawn(Preprocess::identity(), |ctx| {
                ctx.offer(&1, 1.0, 1);
                ctx.fail(2, "non-finite gradient".to_string());
            })
            .unwrap();
        wait_until_idle(&worker);

        assert!(worker.has_solution());
        assert!(matches!(worker.take_solution(), Err(TandemError::Optimization(_))));
    }

    #[test]
    fn test_stop_ends_cooperative_job() {
        let mut worker: OptimizerWorker<u32> = OptimizerWorker::new("test");
        worker
            .spawn(Preprocess::identity(), |ctx| {
                let mut iterations = 0;
                while ctx.should_continue() {
                    iterations += 1;
                    ctx.offer(&iterations, 0.0, iterations as usize);
                    thread::yield_now();
                }
            })
            .unwrap();
        assert!(worker.spawn(Preprocess::identity(), |_| {}).is_err());
        worker.stop();
        assert!(!worker.is_running());
        assert!(!worker.has_solution());
        assert!(worker.take_solution().unwrap().is_none());
    }

    #[test]
    fn test_stop_after_finish_keeps_result() {
        let mut worker: OptimizerWorker<u32> = OptimizerWorker::new("test");
        worker.spawn(Preprocess::identity(), |ctx| ctx.offer(&7, 1.0, 1)).unwrap();
        wait_until_idle(&worker);
        worker.stop();

        assert!(worker.has_solution());
        assert_eq!(worker.take_solution().unwrap().unwrap().model, 7);
    }
}
