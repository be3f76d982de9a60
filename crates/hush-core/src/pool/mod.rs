//! Background threads for inference and ad-hoc work.
//!
//! One thread is dedicated to inference: it waits for a full frame of decimated
//! samples, pops it in one bulk read, and hands it to the [`InferenceEngine`] at a
//! fixed cadence. The remaining threads serve a bounded FIFO of submitted tasks.
//!
//! Nothing here runs on the audio thread. The audio thread's only contact with the
//! pool is the lock-free [`QueueProducer`](crate::queue::QueueProducer) feeding the
//! inference thread.
//!
//! # Example
//!
//! ```ignore
//! let pool = RealtimeThreadPool::new(PoolConfig::default());
//! pool.start(consumer, shared_inference(engine));
//! pool.submit_task(|| tracing::info!("off the audio thread"));
//! pool.stop();
//! ```

mod priority;
mod stats;

pub use priority::ThreadPriority;
pub use stats::PoolStatsSnapshot;

use crate::error::{Error, Result};
use crate::inference::SharedInference;
use crate::lockfree::AtomicFlag;
use crate::queue::QueueConsumer;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use stats::PoolStats;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Maximum number of queued, not yet started tasks.
pub const TASK_QUEUE_CAPACITY: usize = 64;

/// Upper bound on automatically sized pools.
pub const MAX_THREADS: usize = 6;

/// Samples per inference frame (20ms at 16kHz).
pub const DEFAULT_FRAME_SIZE: usize = 320;

/// Sleep between polls when no frame is due or available.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Decimated-sample queue shared with the inference thread.
pub type SharedConsumer = Arc<Mutex<QueueConsumer<f32>>>;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Thread pool configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Total thread count including the inference thread. 0 picks
    /// `available_parallelism - 1`, capped at [`MAX_THREADS`].
    pub thread_count: usize,
    pub priority: ThreadPriority,
    /// Samples handed to the engine per call.
    pub frame_size: usize,
    /// Period of the inference schedule, in milliseconds. A late tick is made up
    /// by the next one instead of shifting every later tick.
    pub interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            thread_count: 0,
            priority: ThreadPriority::Low,
            frame_size: DEFAULT_FRAME_SIZE,
            interval_ms: 20,
        }
    }
}

impl PoolConfig {
    /// Thread count after resolving auto sizing. Never less than 2: one inference
    /// thread and at least one task worker.
    pub fn resolved_thread_count(&self) -> usize {
        let count = if self.thread_count == 0 {
            default_thread_count()
        } else {
            self.thread_count
        };
        count.max(2)
    }
}

/// `available_parallelism - 1`, at least 1, at most [`MAX_THREADS`].
pub fn default_thread_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .clamp(1, MAX_THREADS)
}

struct Shared {
    running: AtomicFlag,
    tasks: Mutex<VecDeque<Task>>,
    task_ready: Condvar,
    stats: PoolStats,
}

/// Inference thread plus task workers.
///
/// All methods take `&self`, so the pool can be shared behind an `Arc` and stopped
/// from inside one of its own tasks.
pub struct RealtimeThreadPool {
    config: PoolConfig,
    thread_count: usize,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl RealtimeThreadPool {
    pub fn new(config: PoolConfig) -> Self {
        let frame_size = config.frame_size.max(1);
        let config = PoolConfig {
            frame_size,
            ..config
        };
        let thread_count = config.resolved_thread_count();

        tracing::info!(
            "Thread pool: {} threads, {:?} priority, frame {} samples every {}ms",
            thread_count,
            config.priority,
            frame_size,
            config.interval_ms
        );

        Self {
            config,
            thread_count,
            shared: Arc::new(Shared {
                running: AtomicFlag::new(false),
                tasks: Mutex::new(VecDeque::with_capacity(TASK_QUEUE_CAPACITY)),
                task_ready: Condvar::new(),
                stats: PoolStats::default(),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.get()
    }

    /// Start the inference thread and task workers.
    ///
    /// Returns false if the pool is already running or a thread could not be spawned.
    pub fn start(&self, queue: SharedConsumer, engine: SharedInference) -> bool {
        match self.try_start(queue, engine) {
            Ok(()) => true,
            Err(Error::AlreadyRunning) => false,
            Err(e) => {
                tracing::error!("Thread pool failed to start: {}", e);
                false
            }
        }
    }

    pub fn try_start(&self, queue: SharedConsumer, engine: SharedInference) -> Result<()> {
        let mut handles = self.handles.lock();
        if self.shared.running.swap(true) {
            return Err(Error::AlreadyRunning);
        }

        let shared = self.shared.clone();
        let config = self.config;
        let spawned = spawn_named("hush-inference".into(), move || {
            inference_loop(shared, queue, engine, config)
        });
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                drop(handles);
                self.stop();
                return Err(e);
            }
        }

        for index in 0..self.thread_count - 1 {
            let shared = self.shared.clone();
            let priority = self.config.priority;
            match spawn_named(format!("hush-worker-{index}"), move || {
                worker_loop(shared, priority)
            }) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    drop(handles);
                    self.stop();
                    return Err(e);
                }
            }
        }

        tracing::info!("Thread pool started ({} threads)", self.thread_count);
        Ok(())
    }

    /// Stop all threads and discard queued tasks. Idempotent.
    ///
    /// Safe to call from inside a submitted task: the calling worker is left to exit
    /// on its own instead of being joined.
    pub fn stop(&self) {
        let discarded = {
            let mut tasks = self.shared.tasks.lock();
            self.shared.running.set(false);
            std::mem::take(&mut *tasks)
        };
        self.shared.task_ready.notify_all();
        // Dropped outside the lock: a task may own the last reference to this pool.
        let discarded_count = discarded.len();
        drop(discarded);

        let handles = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            return;
        }

        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::error!("Pool thread '{}' panicked", name);
            }
        }

        tracing::info!(
            "Thread pool stopped ({} queued tasks discarded)",
            discarded_count
        );
    }

    /// Queue a task for a worker. Returns false if the pool is stopped or the queue
    /// holds [`TASK_QUEUE_CAPACITY`] tasks already.
    pub fn submit_task<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut tasks = self.shared.tasks.lock();
            if !self.shared.running.get() || tasks.len() >= TASK_QUEUE_CAPACITY {
                return false;
            }
            tasks.push_back(Box::new(task));
        }
        self.shared.task_ready.notify_one();
        true
    }

    /// Tasks waiting for a worker.
    pub fn queue_len(&self) -> usize {
        self.shared.tasks.lock().len()
    }

    pub fn statistics(&self) -> PoolStatsSnapshot {
        self.shared.stats.snapshot(self.config.interval_ms)
    }

    pub fn reset_statistics(&self) {
        self.shared.stats.reset();
    }
}

impl Drop for RealtimeThreadPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_named<F>(name: String, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map_err(|source| Error::ThreadSpawn { name, source })
}

fn inference_loop(
    shared: Arc<Shared>,
    queue: SharedConsumer,
    engine: SharedInference,
    config: PoolConfig,
) {
    config.priority.apply_to_current_thread();

    let interval = Duration::from_millis(config.interval_ms);
    let mut frame = vec![0.0f32; config.frame_size];
    let mut next_due = Instant::now();

    while shared.running.get() {
        let now = Instant::now();
        let (available, popped) = {
            let mut consumer = queue.lock();
            let available = consumer.size();
            if now >= next_due && available >= frame.len() {
                (available, consumer.pop_bulk(&mut frame))
            } else {
                (available, 0)
            }
        };

        if popped < frame.len() {
            if available < frame.len() {
                // Caught up with the input: no backlog to work off later.
                next_due = next_due.max(now);
            }
            thread::sleep(IDLE_BACKOFF);
            continue;
        }

        // Ticks are scheduled from the previous deadline, not from when the frame
        // was actually popped, so sleep overshoot never stretches the period.
        next_due += interval;

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.lock().infer(&frame)));
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(result)) if result.success => shared.stats.record_frame(elapsed),
            Ok(Ok(_)) => {
                tracing::debug!("Inference reported failure, frame dropped");
                shared.stats.record_drop();
            }
            Ok(Err(e)) => {
                tracing::debug!("{}, frame dropped", e);
                shared.stats.record_drop();
            }
            Err(_) => {
                tracing::warn!("Inference panicked, frame dropped");
                shared.stats.record_drop();
            }
        }
    }

    tracing::debug!("Inference thread exiting");
}

fn worker_loop(shared: Arc<Shared>, priority: ThreadPriority) {
    priority.apply_to_current_thread();

    loop {
        let task = {
            let mut tasks = shared.tasks.lock();
            loop {
                if !shared.running.get() {
                    return;
                }
                if let Some(task) = tasks.pop_front() {
                    break task;
                }
                shared.task_ready.wait(&mut tasks);
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::warn!("Pool task panicked");
        }
        shared.stats.record_task();
    }
}
