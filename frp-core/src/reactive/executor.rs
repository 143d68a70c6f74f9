//! Executors
//!
//! The graph never creates threads. Every call of a user function is handed to
//! an [`Executor`] as a unit of work, and the executor decides where and when
//! it runs.
//!
//! # Bundled Executors
//!
//! - [`Immediate`]: runs the work on the calling thread before returning.
//!   This is what a bare function runs on.
//! - [`ThreadPool`]: a fixed set of worker threads draining a FIFO queue.
//! - [`TaskQueue`]: holds the work until the owner drains it, in order or in
//!   reverse. Useful to force a particular completion order.
//!
//! # Pairing Functions with Executors
//!
//! Combinators accept either a bare function or the result of
//! [`execute_on`], which pairs a function with the executor it should run on.
//! Both are accepted through [`IntoExecuteOn`].

use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::error::Result;
use crate::graph::{Arguments, Generator};

/// A unit of work submitted to an executor.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted units of work.
///
/// An executor must eventually run every unit exactly once, in no particular
/// order relative to other units.
pub trait Executor: Send + Sync + 'static {
    /// Submit `work`.
    fn execute(&self, work: Work);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, work: Work) {
        (**self).execute(work)
    }
}

/// Runs work synchronously on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Executor for Immediate {
    fn execute(&self, work: Work) {
        work()
    }
}

// ----------------------------------------------------------------------------
// Thread pool
// ----------------------------------------------------------------------------

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Work>,
    running: usize,
    shutdown: bool,
}

impl PoolState {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.running == 0
    }
}

#[derive(Default)]
struct PoolShared {
    state: Mutex<PoolState>,
    work_available: Condvar,
    idle: Condvar,
}

impl PoolShared {
    fn run_worker(&self) {
        loop {
            let work = {
                let mut state = self.state.lock();
                loop {
                    if let Some(work) = state.queue.pop_front() {
                        state.running += 1;
                        break work;
                    }
                    if state.shutdown {
                        return;
                    }
                    self.work_available.wait(&mut state);
                }
            };

            if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
                error!(
                    thread = thread::current().name().unwrap_or("<unnamed>"),
                    "unit of work panicked"
                );
            }

            let mut state = self.state.lock();
            state.running -= 1;
            if state.is_idle() {
                self.idle.notify_all();
            }
        }
    }
}

/// A fixed number of worker threads sharing one FIFO queue.
///
/// Dropping the pool lets the workers finish every queued unit, then joins
/// them.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Arc::new(ThreadPool::builder().threads(4).build()?);
/// let squares = map(execute_on(pool.clone(), |x: &i32| x * x), numbers.clone());
/// pool.wait_idle();
/// ```
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Start a pool with `threads` workers.
    pub fn new(threads: usize) -> Result<Self> {
        Self::builder().threads(threads).build()
    }

    /// Configure a pool.
    pub fn builder() -> ThreadPoolBuilder {
        ThreadPoolBuilder::default()
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Block until the queue is empty and no worker is running a unit.
    ///
    /// Work submitted by running units is waited for as well.
    pub fn wait_idle(&self) {
        let mut state = self.shared.state.lock();
        while !state.is_idle() {
            self.shared.idle.wait(&mut state);
        }
    }
}

impl Executor for ThreadPool {
    fn execute(&self, work: Work) {
        self.shared.state.lock().queue.push_back(work);
        self.shared.work_available.notify_one();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.work_available.notify_all();

        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            // The last handle can be released by a unit running on the pool.
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                error!("worker thread terminated abnormally");
            }
        }
    }
}

impl Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ThreadPool")
            .field("threads", &self.workers.len())
            .field("queued", &state.queue.len())
            .field("running", &state.running)
            .finish()
    }
}

/// Builder for [`ThreadPool`].
#[derive(Debug, Clone)]
pub struct ThreadPoolBuilder {
    threads: Option<usize>,
    name: String,
}

impl Default for ThreadPoolBuilder {
    fn default() -> Self {
        Self {
            threads: None,
            name: String::from("frp-worker"),
        }
    }
}

impl ThreadPoolBuilder {
    /// Number of workers. Defaults to the available parallelism; zero is
    /// raised to one.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Thread name prefix; workers are named `{prefix}-{index}`.
    pub fn name(mut self, prefix: impl Into<String>) -> Self {
        self.name = prefix.into();
        self
    }

    /// Spawn the workers.
    pub fn build(self) -> Result<ThreadPool> {
        let threads = self
            .threads
            .unwrap_or_else(|| thread::available_parallelism().map_or(1, NonZeroUsize::get))
            .max(1);
        let mut pool = ThreadPool {
            shared: Arc::new(PoolShared::default()),
            workers: Vec::with_capacity(threads),
        };

        for index in 0..threads {
            let shared = Arc::clone(&pool.shared);
            // On failure the partially built pool is dropped, which joins
            // the workers already started.
            let worker = thread::Builder::new()
                .name(format!("{}-{}", self.name, index))
                .spawn(move || shared.run_worker())?;
            pool.workers.push(worker);
        }

        Ok(pool)
    }
}

// ----------------------------------------------------------------------------
// Task queue
// ----------------------------------------------------------------------------

/// Defers every unit of work until the owner drains the queue.
#[derive(Default)]
pub struct TaskQueue {
    queue: Mutex<VecDeque<Work>>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending units.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether no unit is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Run the oldest pending unit. Returns `false` if there was none.
    pub fn run_one(&self) -> bool {
        let work = self.queue.lock().pop_front();
        match work {
            Some(work) => {
                work();
                true
            }
            None => false,
        }
    }

    /// Run pending units oldest first until the queue is empty, including
    /// units submitted while draining. Returns the number of units run.
    pub fn run_all(&self) -> usize {
        let mut count = 0;
        while self.run_one() {
            count += 1;
        }
        count
    }

    /// Run pending units newest first until the queue is empty.
    ///
    /// Units submitted while draining are run in a later batch, again newest
    /// first. Returns the number of units run.
    pub fn run_all_reversed(&self) -> usize {
        let mut count = 0;
        loop {
            let batch: Vec<Work> = self.queue.lock().drain(..).collect();
            if batch.is_empty() {
                return count;
            }
            for work in batch.into_iter().rev() {
                work();
                count += 1;
            }
        }
    }
}

impl Executor for TaskQueue {
    fn execute(&self, work: Work) {
        self.queue.lock().push_back(work);
    }
}

impl Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// execute_on
// ----------------------------------------------------------------------------

/// A function paired with the executor it runs on.
#[derive(Debug, Clone)]
pub struct ExecuteOn<E, F> {
    executor: E,
    function: F,
}

impl<E, F> ExecuteOn<E, F> {
    /// The executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The function.
    pub fn function(&self) -> &F {
        &self.function
    }

    /// Split into executor and function.
    pub fn into_parts(self) -> (E, F) {
        (self.executor, self.function)
    }
}

/// Run `function` on `executor` when used in a combinator.
pub fn execute_on<E: Executor, F>(executor: E, function: F) -> ExecuteOn<E, F> {
    ExecuteOn { executor, function }
}

/// Anything a combinator accepts as its function: a bare function (run on
/// [`Immediate`]) or an [`ExecuteOn`] pairing.
pub trait IntoExecuteOn<Args: Arguments> {
    /// Executor the function runs on.
    type Executor: Executor;

    /// The function itself.
    type Function: Generator<Args>;

    /// Convert into an explicit pairing.
    fn into_execute_on(self) -> ExecuteOn<Self::Executor, Self::Function>;
}

impl<F, R> IntoExecuteOn<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    type Executor = Immediate;
    type Function = F;

    fn into_execute_on(self) -> ExecuteOn<Immediate, F> {
        execute_on(Immediate, self)
    }
}

// Bare functions are matched on `Fn` rather than on `Generator` so that the
// impl for `ExecuteOn` below stays disjoint.
macro_rules! bare_function_impls {
    ($($T:ident),+) => {
        impl<F, R, $($T),+> IntoExecuteOn<($($T,)+)> for F
        where
            F: Fn($(&$T),+) -> R + Send + Sync + 'static,
            R: Send + Sync + 'static,
            $($T: Send + Sync + 'static),+
        {
            type Executor = Immediate;
            type Function = F;

            fn into_execute_on(self) -> ExecuteOn<Immediate, F> {
                execute_on(Immediate, self)
            }
        }
    };
}

bare_function_impls!(A);
bare_function_impls!(A, B);
bare_function_impls!(A, B, C);
bare_function_impls!(A, B, C, D);
bare_function_impls!(A, B, C, D, E);
bare_function_impls!(A, B, C, D, E, G);

impl<Args: Arguments, E: Executor, F: Generator<Args>> IntoExecuteOn<Args> for ExecuteOn<E, F> {
    type Executor = E;
    type Function = F;

    fn into_execute_on(self) -> Self {
        self
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<usize>>>, impl Fn(usize) -> Work) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        (log, move |tag| {
            let log = log_clone.clone();
            Box::new(move || log.lock().push(tag))
        })
    }

    #[test]
    fn immediate_runs_before_returning() {
        let (log, work) = recorder();
        Immediate.execute(work(1));
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn task_queue_defers_until_drained() {
        let queue = TaskQueue::new();
        let (log, work) = recorder();
        queue.execute(work(1));
        queue.execute(work(2));

        assert!(log.lock().is_empty());
        assert_eq!(queue.len(), 2);

        assert!(queue.run_one());
        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(queue.run_all(), 1);
        assert!(!queue.run_one());
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn task_queue_runs_reversed() {
        let queue = TaskQueue::new();
        let (log, work) = recorder();
        for tag in 0..3 {
            queue.execute(work(tag));
        }

        assert_eq!(queue.run_all_reversed(), 3);
        assert_eq!(*log.lock(), vec![2, 1, 0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn task_queue_runs_work_submitted_while_draining() {
        let queue = Arc::new(TaskQueue::new());
        let (log, work) = recorder();
        let nested = work(2);
        let inner = queue.clone();
        queue.execute(Box::new(move || inner.execute(nested)));
        queue.execute(work(1));

        assert_eq!(queue.run_all(), 3);
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn pool_runs_everything_before_idle() {
        let pool = ThreadPool::builder()
            .threads(4)
            .name("test-pool")
            .build()
            .expect("spawn workers");
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..1000 {
            let count = count.clone();
            pool.execute(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.wait_idle();

        assert_eq!(count.load(Ordering::SeqCst), 1000);
        assert_eq!(pool.threads(), 4);
    }

    #[test]
    fn pool_waits_for_nested_work() {
        let pool = Arc::new(ThreadPool::new(2).expect("spawn workers"));
        let count = Arc::new(AtomicUsize::new(0));

        {
            let inner = pool.clone();
            let count = count.clone();
            pool.execute(Box::new(move || {
                let count = count.clone();
                inner.execute(Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }));
            }));
        }
        pool.wait_idle();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pool_survives_panicking_work() {
        let pool = ThreadPool::new(1).expect("spawn workers");
        let count = Arc::new(AtomicUsize::new(0));

        pool.execute(Box::new(|| panic!("boom")));
        let counted = count.clone();
        pool.execute(Box::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        pool.wait_idle();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_pool_drains_queue() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let pool = ThreadPool::new(2).expect("spawn workers");
            for _ in 0..100 {
                let count = count.clone();
                pool.execute(Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }
        assert_eq!(count.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn zero_threads_is_raised_to_one() {
        let pool = ThreadPool::new(0).expect("spawn workers");
        assert_eq!(pool.threads(), 1);
    }

    #[test]
    fn bare_function_runs_immediately() {
        let pairing = IntoExecuteOn::<(i32,)>::into_execute_on(|value: &i32| value * 2);
        let (_, function) = pairing.into_parts();
        assert_eq!(Generator::<(i32,)>::invoke(&function, (&21,)), 42);
    }

    #[test]
    fn explicit_pairing_keeps_its_executor() {
        let queue = Arc::new(TaskQueue::new());
        let pairing = execute_on(queue.clone(), |value: &i32| value + 1);
        let pairing = IntoExecuteOn::<(i32,)>::into_execute_on(pairing);

        pairing.executor().execute(Box::new(|| {}));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn bare_functions_of_every_arity_are_accepted() {
        let constant = IntoExecuteOn::<()>::into_execute_on(|| 7);
        let (_, constant) = constant.into_parts();
        assert_eq!(Generator::<()>::invoke(&constant, ()), 7);

        let join = IntoExecuteOn::<(i32, i32, i32)>::into_execute_on(
            |a: &i32, b: &i32, c: &i32| a * b + c,
        );
        let (_, join) = join.into_parts();
        assert_eq!(Generator::<(i32, i32, i32)>::invoke(&join, (&2, &3, &4)), 10);
    }
}
