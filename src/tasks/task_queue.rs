//! Bounded multi-producer/multi-consumer task queue with a fixed worker pool.
//!
//! ## Design
//!
//! - Fixed ring of entries, each `Available`, `Pending` or `InExecution`
//! - Monotonic commit cursor (producers) and dispatch cursor (consumers)
//! - A consumer claims entry `i` by CAS-ing the dispatch cursor from `i` to
//!   `i + 1`; only the winner runs the job, so every job runs exactly once
//! - Idle workers park on a counting semaphore released once per push
//! - The calling thread joins in as an extra worker (`WorkerId::Caller`) while
//!   it waits, then sleeps on a condition variable until the unfinished count
//!   reaches zero
//!
//! No lock is held while a job runs. Producers are serialized by a small
//! submit lock so the ring can be filled from several threads.

use super::semaphore::Semaphore;
use crate::count_call;
use crate::error::TaskQueueError;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job<'a> = Box<dyn FnOnce(WorkerId) + Send + 'a>;
type PanicPayload = Box<dyn Any + Send + 'static>;

thread_local! {
    /// Address of the queue whose job this thread is running, 0 otherwise.
    static RUNNING_JOB_OF: Cell<usize> = const { Cell::new(0) };
}

/// Logical identity of the thread running a job.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WorkerId {
    /// The thread inside `wait_for_all` (or a scope) helping out.
    Caller,
    /// Pool worker with the given index.
    Pool(usize),
}

impl WorkerId {
    /// `-1` for the caller, the pool index otherwise.
    #[inline]
    pub fn logical_index(self) -> i32 {
        match self {
            WorkerId::Caller => -1,
            WorkerId::Pool(index) => index as i32,
        }
    }
}

/// Task queue configuration parameters
#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    /// Ring capacity: the most unfinished jobs that can be outstanding
    pub entry_count: usize,
    /// Explicit pool size; `None` derives it from the hardware
    pub thread_count: Option<usize>,
    /// Fraction of hardware threads handed to the pool when `thread_count` is `None`
    pub max_system_usage: f32,
    /// Stack size of each worker thread in bytes
    pub stack_size: usize,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            entry_count: 32,
            thread_count: None,
            max_system_usage: 0.8,
            stack_size: 1024 * 1024,
        }
    }
}

impl TaskQueueConfig {
    pub fn resolved_thread_count(&self) -> usize {
        self.thread_count.unwrap_or_else(|| {
            let hardware = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
            ((hardware as f32 * self.max_system_usage) as usize).max(1)
        })
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum EntryState {
    Available = 0,
    Pending = 1,
    InExecution = 2,
}

struct TaskEntry {
    state: AtomicU8,
    job: UnsafeCell<Option<Job<'static>>>,
}

// Safety: `job` is written only by the producer holding the submit lock while
// the entry is `Available`, and taken only by the single consumer that won the
// dispatch CAS for it. The cursors' release/acquire pairs order those accesses.
unsafe impl Sync for TaskEntry {}

/// Pad to cache line to prevent false sharing
#[repr(align(64))]
struct CachePadded<T>(T);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DispatchOutcome {
    Dispatched,
    NoAvailableTasks,
    AlreadyClaimed,
}

struct Shared {
    entries: Box<[TaskEntry]>,
    dispatch_cursor: CachePadded<AtomicU64>,
    commit_cursor: CachePadded<AtomicU64>,
    unfinished: CachePadded<AtomicUsize>,
    tasks_available: Semaphore,
    submit_lock: Mutex<()>,
    completion_lock: Mutex<()>,
    all_done: Condvar,
    panic_payload: Mutex<Option<PanicPayload>>,
    shutdown: AtomicBool,
}

impl Shared {
    fn new(entry_count: usize) -> Self {
        let entries = (0..entry_count)
            .map(|_| TaskEntry {
                state: AtomicU8::new(EntryState::Available as u8),
                job: UnsafeCell::new(None),
            })
            .collect();
        Self {
            entries,
            dispatch_cursor: CachePadded(AtomicU64::new(0)),
            commit_cursor: CachePadded(AtomicU64::new(0)),
            unfinished: CachePadded(AtomicUsize::new(0)),
            tasks_available: Semaphore::new(0),
            submit_lock: Mutex::new(()),
            completion_lock: Mutex::new(()),
            all_done: Condvar::new(),
            panic_payload: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        }
    }

    #[inline]
    fn entry(&self, index: u64) -> &TaskEntry {
        &self.entries[(index % self.entries.len() as u64) as usize]
    }

    /// Publish a job into the next ring slot, or hand it back if that slot is
    /// still occupied.
    fn try_push(&self, job: Job<'static>) -> Result<(), Job<'static>> {
        let _guard = self.submit_lock.lock();
        let index = self.commit_cursor.0.load(Ordering::Relaxed);
        let entry = self.entry(index);
        if entry.state.load(Ordering::Acquire) != EntryState::Available as u8 {
            return Err(job);
        }

        // Safety: the slot is available and we hold the submit lock, so no
        // consumer can claim it until the commit cursor moves past `index`.
        unsafe {
            *entry.job.get() = Some(job);
        }
        entry.state.store(EntryState::Pending as u8, Ordering::Relaxed);
        self.unfinished.0.fetch_add(1, Ordering::AcqRel);
        self.commit_cursor.0.store(index + 1, Ordering::Release);
        self.tasks_available.release(1);
        Ok(())
    }

    fn dispatch_next(&self, worker: WorkerId) -> DispatchOutcome {
        let next = self.dispatch_cursor.0.load(Ordering::Acquire);
        if next >= self.commit_cursor.0.load(Ordering::Acquire) {
            return DispatchOutcome::NoAvailableTasks;
        }
        if self
            .dispatch_cursor
            .0
            .compare_exchange(next, next + 1, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return DispatchOutcome::AlreadyClaimed;
        }

        // This thread now owns entry `next`.
        let entry = self.entry(next);
        debug_assert_eq!(entry.state.load(Ordering::Acquire), EntryState::Pending as u8);
        entry.state.store(EntryState::InExecution as u8, Ordering::Relaxed);

        // Safety: winning the CAS gives exclusive access to this entry's job.
        let job = unsafe { (*entry.job.get()).take() };
        if let Some(job) = job {
            let outer = RUNNING_JOB_OF.with(|cell| cell.replace(self.address()));
            let result = panic::catch_unwind(AssertUnwindSafe(|| job(worker)));
            RUNNING_JOB_OF.with(|cell| cell.set(outer));
            if let Err(payload) = result {
                log::error!("task panicked on worker {}", worker.logical_index());
                self.panic_payload.lock().get_or_insert(payload);
            }
        }
        if worker == WorkerId::Caller {
            count_call!(crate::perf::RENDER_COUNTERS.tasks_run_by_caller);
        } else {
            count_call!(crate::perf::RENDER_COUNTERS.tasks_run_by_pool);
        }

        entry.state.store(EntryState::Available as u8, Ordering::Release);
        if self.unfinished.0.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.completion_lock.lock();
            self.all_done.notify_all();
        }
        DispatchOutcome::Dispatched
    }

    fn address(&self) -> usize {
        self as *const Self as usize
    }

    fn assert_outside_own_job(&self) {
        assert!(
            RUNNING_JOB_OF.with(Cell::get) != self.address(),
            "TaskQueue waited on from inside one of its own jobs"
        );
    }

    /// Run claimable jobs on the calling thread, then block until every
    /// unfinished job is done. Returns the first panic raised by a job.
    ///
    /// Panics when called from inside one of this queue's jobs: that job
    /// counts as unfinished, so the wait could never end.
    fn drain_and_wait(&self) -> Option<PanicPayload> {
        self.assert_outside_own_job();
        while self.dispatch_next(WorkerId::Caller) != DispatchOutcome::NoAvailableTasks {}

        let mut guard = self.completion_lock.lock();
        while self.unfinished.0.load(Ordering::Acquire) > 0 {
            self.all_done.wait(&mut guard);
        }
        drop(guard);

        self.panic_payload.lock().take()
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize) {
    let worker = WorkerId::Pool(index);
    loop {
        while shared.dispatch_next(worker) != DispatchOutcome::NoAvailableTasks {}
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        shared.tasks_available.acquire();
    }
    log::trace!("task queue worker {index} exiting");
}

pub struct TaskQueue {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskQueue {
    pub fn new(config: TaskQueueConfig) -> Result<Self, TaskQueueError> {
        if config.entry_count == 0 {
            return Err(TaskQueueError::InvalidConfig("entry_count must be at least 1"));
        }
        let thread_count = config.resolved_thread_count();

        // Workers are pushed one by one so a failed spawn drops (and joins)
        // the ones already running.
        let mut queue = Self {
            shared: Arc::new(Shared::new(config.entry_count)),
            workers: Vec::with_capacity(thread_count),
        };
        for index in 0..thread_count {
            let shared = queue.shared.clone();
            let handle = thread::Builder::new()
                .name(format!("raster-worker-{index}"))
                .stack_size(config.stack_size)
                .spawn(move || worker_loop(shared, index))
                .map_err(|source| TaskQueueError::ThreadSpawn { index, source })?;
            queue.workers.push(handle);
        }

        log::debug!(
            "task queue started: {} workers, {} entries",
            thread_count,
            config.entry_count
        );
        Ok(queue)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.entries.len()
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs pushed and not yet completed.
    #[inline]
    pub fn unfinished(&self) -> usize {
        self.shared.unfinished.0.load(Ordering::Acquire)
    }

    /// Queue a `'static` job. Fails with `QueueFull` when `capacity()` jobs are
    /// already outstanding.
    pub fn push<F>(&self, job: F) -> Result<(), TaskQueueError>
    where
        F: FnOnce(WorkerId) + Send + 'static,
    {
        self.shared
            .try_push(Box::new(job))
            .map_err(|_| TaskQueueError::QueueFull { capacity: self.capacity() })
    }

    /// Help run queued jobs, then block until all of them have completed.
    /// A panic from any job is resumed here.
    ///
    /// Panics if called from one of this queue's own jobs.
    pub fn wait_for_all(&self) {
        if let Some(payload) = self.shared.drain_and_wait() {
            panic::resume_unwind(payload);
        }
    }

    /// Run `f` with a scope whose jobs may borrow from the enclosing stack
    /// frame. Every job pushed through the scope has completed when this
    /// returns. Like `wait_for_all`, it must not be entered from one of this
    /// queue's jobs.
    pub fn scope<'env, F, R>(&self, f: F) -> R
    where
        F: for<'q> FnOnce(&TaskScope<'q, 'env>) -> R,
    {
        // Checked before `f` runs so no borrowing job is queued by a scope
        // that cannot wait for it.
        self.shared.assert_outside_own_job();
        let scope = TaskScope {
            queue: self,
            _env: PhantomData,
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&scope)));
        let job_panic = self.shared.drain_and_wait();
        match result {
            Err(payload) => panic::resume_unwind(payload),
            Ok(value) => {
                if let Some(payload) = job_panic {
                    panic::resume_unwind(payload);
                }
                value
            }
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        if self.shared.drain_and_wait().is_some() {
            log::error!("task queue dropped with an unobserved task panic");
        }
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.tasks_available.release(self.workers.len());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Handle for pushing borrowing jobs inside `TaskQueue::scope`.
pub struct TaskScope<'q, 'env> {
    queue: &'q TaskQueue,
    _env: PhantomData<&'env mut &'env ()>,
}

impl<'q, 'env> TaskScope<'q, 'env> {
    fn erase<F>(job: F) -> Job<'static>
    where
        F: FnOnce(WorkerId) + Send + 'env,
    {
        let job: Job<'env> = Box::new(job);
        // Safety: `TaskQueue::scope` does not return (or unwind) before every
        // job pushed through this scope has run, so nothing borrowed for
        // `'env` is used after it ends.
        unsafe { std::mem::transmute::<Job<'env>, Job<'static>>(job) }
    }

    pub fn push<F>(&self, job: F) -> Result<(), TaskQueueError>
    where
        F: FnOnce(WorkerId) + Send + 'env,
    {
        self.queue
            .shared
            .try_push(Self::erase(job))
            .map_err(|_| TaskQueueError::QueueFull { capacity: self.queue.capacity() })
    }

    /// Queue the job, or run it right here on the caller when the ring is full.
    pub fn push_or_run<F>(&self, job: F)
    where
        F: FnOnce(WorkerId) + Send + 'env,
    {
        if let Err(job) = self.queue.shared.try_push(Self::erase(job)) {
            job(WorkerId::Caller);
        }
    }

    #[inline]
    pub fn queue(&self) -> &'q TaskQueue {
        self.queue
    }
}
