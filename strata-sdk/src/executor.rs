//! Bounded Executor
//!
//! A small thread pool for hook work that must not stall the host: a bounded
//! queue, a core/max thread range, and a per-call deadline after which the
//! caller gets its default value instead of the result.
//!
//! Submission rules, in order:
//!
//! 1. fewer than `core_threads` workers: start a core worker for the task
//! 2. queue below `queue_capacity`: enqueue
//! 3. fewer than `max_threads` workers: start an extra worker for the task
//! 4. otherwise (or after shutdown): run the task on the submitting thread
//!
//! Extra workers exit after `keep_alive` without work. A task that misses its
//! deadline keeps running; its result is discarded.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use strata_sdk::config::ExecutorConfig;
//! use strata_sdk::executor::BoundedExecutor;
//!
//! let executor = BoundedExecutor::new(ExecutorConfig::default());
//! let value = executor.run_with_timeout(|| 21 * 2, Duration::from_millis(50), 0);
//! assert_eq!(value, 42);
//! executor.shutdown();
//! ```

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use strata_core::error::panic_message;

use crate::config::ExecutorConfig;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a task produced no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("task failed: {0}")]
    Failed(String),
}

impl TaskError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Slot
// ─────────────────────────────────────────────────────────────────────────────

enum Outcome<T> {
    Done(T),
    Failed(String),
    TimedOut,
}

/// Result cell shared by a task and its waiter. Completed exactly once.
struct CompletionSlot<T> {
    outcome: Mutex<Option<Outcome<T>>>,
    ready: Condvar,
}

impl<T> CompletionSlot<T> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store the outcome unless one is already stored, bumping `counter`
    /// before any waiter can observe it.
    fn complete(&self, outcome: Outcome<T>, counter: &AtomicU64) -> bool {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        counter.fetch_add(1, Ordering::Relaxed);
        *slot = Some(outcome);
        self.ready.notify_all();
        true
    }
}

/// Handle to a submitted task.
pub struct PendingWork<T> {
    slot: Arc<CompletionSlot<T>>,
    counters: Arc<ExecutorCounters>,
}

impl<T> PendingWork<T> {
    /// Whether the task has finished (or failed).
    pub fn is_finished(&self) -> bool {
        self.slot
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Block until the task finishes or `timeout` elapses.
    ///
    /// On timeout the slot is marked timed out, so a late result is dropped.
    pub fn wait(self, timeout: Duration) -> Result<T, TaskError> {
        let guard = self.slot.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = self
            .slot
            .ready
            .wait_timeout_while(guard, timeout, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);

        match guard.take() {
            Some(Outcome::Done(value)) => Ok(value),
            Some(Outcome::Failed(message)) => Err(TaskError::Failed(message)),
            Some(Outcome::TimedOut) | None => {
                *guard = Some(Outcome::TimedOut);
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                Err(TaskError::TimedOut {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stats
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ExecutorCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    failed: AtomicU64,
    caller_runs: AtomicU64,
}

/// Executor counters snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExecutorStats {
    pub submitted: u64,
    pub completed: u64,
    pub timed_out: u64,
    pub failed: u64,
    /// Tasks run on the submitting thread.
    pub caller_runs: u64,
    pub active_threads: usize,
    pub queued: usize,
}

impl ExecutorStats {
    pub fn completion_rate(&self) -> f64 {
        ratio(self.completed, self.submitted)
    }

    pub fn timeout_rate(&self) -> f64 {
        ratio(self.timed_out, self.submitted)
    }

    pub fn failure_rate(&self) -> f64 {
        ratio(self.failed, self.submitted)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Executor
// ─────────────────────────────────────────────────────────────────────────────

struct PoolState {
    jobs: VecDeque<Job>,
    workers: usize,
    spawned: usize,
    shutdown: bool,
}

struct Shared {
    config: ExecutorConfig,
    state: Mutex<PoolState>,
    /// Signaled when a job is queued or on shutdown.
    available: Condvar,
    /// Signaled when a worker exits.
    exited: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Bounded thread pool with caller-runs overflow and per-call deadlines.
pub struct BoundedExecutor {
    shared: Arc<Shared>,
    counters: Arc<ExecutorCounters>,
}

impl BoundedExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        tracing::debug!(
            core = config.core_threads,
            max = config.max_threads,
            queue = config.queue_capacity,
            timeout_ms = config.default_timeout_ms,
            "Creating bounded executor"
        );

        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(PoolState {
                    jobs: VecDeque::new(),
                    workers: 0,
                    spawned: 0,
                    shutdown: false,
                }),
                available: Condvar::new(),
                exited: Condvar::new(),
            }),
            counters: Arc::new(ExecutorCounters::default()),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.shared.config
    }

    /// Deadline used by [`run_or_default`](Self::run_or_default).
    pub fn default_timeout(&self) -> Duration {
        self.shared.config.default_timeout()
    }

    /// Submit a task.
    pub fn submit<T, F>(&self, task: F) -> PendingWork<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        let slot = Arc::new(CompletionSlot::new());
        let job_slot = slot.clone();
        let counters = self.counters.clone();
        let job: Job = Box::new(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(value) => Outcome::Done(value),
                Err(payload) => Outcome::Failed(panic_message(payload.as_ref())),
            };
            let counter = match outcome {
                Outcome::Done(_) => &counters.completed,
                _ => &counters.failed,
            };
            job_slot.complete(outcome, counter);
        });

        if let Err(job) = self.schedule(job) {
            self.counters.caller_runs.fetch_add(1, Ordering::Relaxed);
            job();
        }

        PendingWork {
            slot,
            counters: self.counters.clone(),
        }
    }

    /// Run a task, returning `default` if it fails or misses `timeout`.
    pub fn run_with_timeout<T, F>(&self, task: F, timeout: Duration, default: T) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match self.submit(task).wait(timeout) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Executor task fell back to default");
                default
            }
        }
    }

    /// [`run_with_timeout`](Self::run_with_timeout) with the configured deadline.
    pub fn run_or_default<T, F>(&self, task: F, default: T) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.run_with_timeout(task, self.default_timeout(), default)
    }

    pub fn stats(&self) -> ExecutorStats {
        let (active_threads, queued) = {
            let state = self.shared.lock();
            (state.workers, state.jobs.len())
        };
        ExecutorStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            caller_runs: self.counters.caller_runs.load(Ordering::Relaxed),
            active_threads,
            queued,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().shutdown
    }

    /// Stop accepting work and wait for workers to drain the queue.
    ///
    /// Returns `false` if workers were still running when the shutdown
    /// timeout elapsed. Work submitted afterwards runs on the caller.
    pub fn shutdown(&self) -> bool {
        let mut state = self.shared.lock();
        if !state.shutdown {
            state.shutdown = true;
            self.shared.available.notify_all();
            tracing::info!(
                workers = state.workers,
                queued = state.jobs.len(),
                "Shutting down executor"
            );
        }

        let timeout = self.shared.config.shutdown_timeout();
        let (state, _) = self
            .shared
            .exited
            .wait_timeout_while(state, timeout, |state| state.workers > 0)
            .unwrap_or_else(PoisonError::into_inner);

        if state.workers > 0 {
            tracing::warn!(
                workers = state.workers,
                timeout_ms = timeout.as_millis() as u64,
                "Executor workers still running after shutdown timeout"
            );
            return false;
        }
        true
    }

    /// Hand a job to the pool, or give it back for the caller to run.
    fn schedule(&self, job: Job) -> Result<(), Job> {
        let config = &self.shared.config;
        let mut state = self.shared.lock();

        if state.shutdown {
            return Err(job);
        }
        if state.workers < config.core_threads {
            return self.spawn_worker(&mut state, job);
        }
        if state.jobs.len() < config.queue_capacity {
            state.jobs.push_back(job);
            self.shared.available.notify_one();
            return Ok(());
        }
        if state.workers < config.max_threads {
            return self.spawn_worker(&mut state, job);
        }
        Err(job)
    }

    fn spawn_worker(&self, state: &mut PoolState, first: Job) -> Result<(), Job> {
        state.spawned += 1;
        let name = format!("{}-{}", self.shared.config.thread_name_prefix, state.spawned);
        let shared = self.shared.clone();

        // The job is parked in a cell so it can be recovered if spawning fails.
        let cell = Arc::new(Mutex::new(Some(first)));
        let worker_cell = cell.clone();

        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            let first = worker_cell.lock().unwrap_or_else(PoisonError::into_inner).take();
            worker_loop(shared, first);
        });

        match spawned {
            Ok(_) => {
                state.workers += 1;
                tracing::trace!(thread = %name, workers = state.workers, "Started executor worker");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(thread = %name, error = %e, "Failed to start executor worker");
                match cell.lock().unwrap_or_else(PoisonError::into_inner).take() {
                    Some(job) => Err(job),
                    None => Ok(()),
                }
            }
        }
    }
}

impl Drop for BoundedExecutor {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.shutdown = true;
        self.shared.available.notify_all();
    }
}

fn worker_loop(shared: Arc<Shared>, first: Option<Job>) {
    if let Some(job) = first {
        job();
    }
    while let Some(job) = next_job(&shared) {
        job();
    }
}

/// Wait for the next job. `None` means this worker has exited and has
/// already been removed from the worker count.
fn next_job(shared: &Shared) -> Option<Job> {
    let keep_alive = shared.config.keep_alive();
    let mut state = shared.lock();

    loop {
        if let Some(job) = state.jobs.pop_front() {
            return Some(job);
        }
        if state.shutdown {
            break;
        }

        if state.workers > shared.config.core_threads {
            let (next, wait) = shared
                .available
                .wait_timeout(state, keep_alive)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
            if wait.timed_out() && state.jobs.is_empty() && state.workers > shared.config.core_threads {
                break;
            }
        } else {
            state = shared
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    state.workers -= 1;
    shared.exited.notify_all();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    fn small(core: usize, max: usize, queue: usize) -> BoundedExecutor {
        BoundedExecutor::new(ExecutorConfig {
            core_threads: core,
            max_threads: max,
            queue_capacity: queue,
            keep_alive_ms: 50,
            ..Default::default()
        })
    }

    #[test]
    fn test_run_returns_value() {
        let executor = BoundedExecutor::new(ExecutorConfig::default());
        assert_eq!(executor.run_or_default(|| 7, 0), 7);

        let stats = executor.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.completion_rate(), 1.0);
        assert!(executor.shutdown());
    }

    #[test]
    fn test_timeout_returns_default_within_window() {
        let executor = BoundedExecutor::new(ExecutorConfig::default());
        let started = Instant::now();

        let value = executor.run_or_default(
            || {
                thread::sleep(Duration::from_millis(300));
                1.0
            },
            -1.0,
        );

        assert_eq!(value, -1.0);
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(executor.stats().timed_out, 1);
    }

    #[test]
    fn test_late_result_is_discarded() {
        let executor = small(1, 1, 4);
        let (tx, rx) = mpsc::channel::<()>();
        let pending = executor.submit(move || {
            let _ = rx.recv();
            5
        });

        let err = pending.wait(Duration::from_millis(10)).unwrap_err();
        assert!(err.is_timeout());

        tx.send(()).unwrap();
        assert!(executor.shutdown());
        assert_eq!(executor.stats().completed, 0);
    }

    #[test]
    fn test_panicking_task_is_a_failure() {
        let executor = small(1, 1, 4);
        let err = executor
            .submit(|| -> u32 { panic!("task exploded") })
            .wait(Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err, TaskError::Failed("task exploded".into()));

        // The worker survives.
        assert_eq!(executor.run_with_timeout(|| 3, Duration::from_secs(1), 0), 3);
        assert_eq!(executor.stats().failed, 1);
        assert_eq!(executor.stats().failure_rate(), 0.5);
    }

    #[test]
    fn test_worker_threads_are_named() {
        let executor = BoundedExecutor::new(ExecutorConfig::default());
        let name = executor.run_with_timeout(
            || thread::current().name().map(str::to_string),
            Duration::from_secs(1),
            None,
        );
        assert_eq!(name.as_deref(), Some("strata-async-1"));
    }

    #[test]
    fn test_caller_runs_when_saturated() {
        let executor = small(1, 1, 1);
        let (tx, rx) = mpsc::channel::<()>();

        let blocker = executor.submit(move || {
            let _ = rx.recv();
        });
        let queued = executor.submit(|| thread::current().id());
        let overflow = executor.submit(|| thread::current().id());

        assert!(overflow.is_finished());
        assert_eq!(overflow.wait(Duration::ZERO).unwrap(), thread::current().id());
        assert_eq!(executor.stats().caller_runs, 1);
        assert_eq!(executor.stats().queued, 1);

        tx.send(()).unwrap();
        blocker.wait(Duration::from_secs(1)).unwrap();
        assert_ne!(queued.wait(Duration::from_secs(1)).unwrap(), thread::current().id());
    }

    #[test]
    fn test_extra_thread_when_queue_full() {
        let executor = small(1, 2, 1);
        let (tx, rx) = mpsc::channel::<()>();

        let _blocker = executor.submit(move || {
            let _ = rx.recv();
        });
        let _queued = executor.submit(|| ());
        let extra = executor.submit(|| thread::current().name().map(str::to_string));

        assert_eq!(
            extra.wait(Duration::from_secs(1)).unwrap().as_deref(),
            Some("strata-async-2")
        );
        assert_eq!(executor.stats().active_threads, 2);
        assert_eq!(executor.stats().caller_runs, 0);

        tx.send(()).unwrap();
        assert!(executor.shutdown());
        assert_eq!(executor.stats().active_threads, 0);
    }

    #[test]
    fn test_extra_thread_retires_after_keep_alive() {
        let executor = small(1, 2, 1);
        let (tx, rx) = mpsc::channel::<()>();

        let blocker = executor.submit(move || {
            let _ = rx.recv();
        });
        let _queued = executor.submit(|| ());
        let _extra = executor.submit(|| ());
        tx.send(()).unwrap();
        blocker.wait(Duration::from_secs(1)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while executor.stats().active_threads > 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(executor.stats().active_threads, 1);
    }

    #[test]
    fn test_shutdown_drains_queue_then_caller_runs() {
        let executor = small(1, 1, 10);
        let pending: Vec<_> = (0..5).map(|i| executor.submit(move || i * 2)).collect();

        assert!(executor.shutdown());
        assert!(executor.is_shutdown());
        for (i, work) in pending.into_iter().enumerate() {
            assert_eq!(work.wait(Duration::ZERO).unwrap(), i * 2);
        }

        let late = executor.submit(|| thread::current().id());
        assert_eq!(late.wait(Duration::ZERO).unwrap(), thread::current().id());
        assert_eq!(executor.stats().caller_runs, 1);
    }
}
