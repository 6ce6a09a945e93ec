//! Background thread pool for blocking chunk reads
//!
//! Work-stealing deques: jobs go to a shared injector, each worker drains its
//! own deque first, then the injector, then steals from siblings. Nothing the
//! workers run touches cache or player state; results travel back over a
//! channel and are applied on the loop thread.

use crossbeam::deque::{Injector, Stealer, Worker};
use log::{trace, warn};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Idle back-off between empty polls
const IDLE_SLEEP: Duration = Duration::from_millis(1);
/// How long `Drop` waits for workers before leaving them to die with the process
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Fixed-size worker pool.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4);
/// workers.execute(move || {
///     let result = source.read(&address);
///     completion.complete(result);
/// });
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    queued: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Spawn `num_threads` workers (at least one).
    ///
    /// Default sizing used by the host: `num_cpus::get() / 2`, since chunk reads
    /// are I/O and decode bound and the loop thread must stay responsive.
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let queued = Arc::new(AtomicUsize::new(0));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(|w| w.stealer()).collect();

        let mut handles = Vec::with_capacity(num_threads);
        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let queued = Arc::clone(&queued);
            let stealers = stealers.clone();

            let spawned = thread::Builder::new()
                .name(format!("flipbook-loader-{}", worker_id))
                .spawn(move || {
                    trace!("Loader worker {} started", worker_id);
                    loop {
                        let job = local
                            .pop()
                            .or_else(|| injector.steal_batch_and_pop(&local).success())
                            .or_else(|| stealers.iter().find_map(|s| s.steal().success()));

                        match job {
                            Some(job) => {
                                queued.fetch_sub(1, Ordering::Relaxed);
                                job();
                            }
                            None if shutdown.load(Ordering::Relaxed) => break,
                            None => thread::sleep(IDLE_SLEEP),
                        }
                    }
                    trace!("Loader worker {} stopped", worker_id);
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("Failed to spawn loader worker {}: {}", worker_id, e),
            }
        }

        trace!("Workers initialized: {} threads", handles.len());

        Self {
            injector,
            handles,
            queued,
            shutdown,
        }
    }

    /// Queue a job. Runs on some worker thread, no return value.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queued.fetch_add(1, Ordering::Relaxed);
        self.injector.push(Box::new(f));
    }

    /// Jobs queued but not yet started
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        trace!("Workers shutting down ({} threads)...", self.handles.len());
        self.shutdown.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown grace period elapsed, detaching remaining workers");
                    return;
                }
                thread::sleep(IDLE_SLEEP);
            }
            let _ = handle.join();
        }
        trace!("All loader workers stopped");
    }
}
