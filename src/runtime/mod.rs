//! The worker threads that spawned tasks and continuations run on.

mod builder;
mod context;
mod parker;
mod pool;
mod worker;

pub use self::builder::Builder;

use self::{context::Context, parker::Parker, pool::Pool};
use crate::{
    error::TaskError,
    task::{self, Handle},
};
use std::{
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, OnceLock},
    task::{Context as PollContext, Poll, Waker},
};

/// Runs `future` to completion on the current thread.
pub fn block_on<F: Future>(future: F) -> F::Output {
    pin_utils::pin_mut!(future);

    let parker = Arc::new(Parker::new());
    let waker = Waker::from(parker.clone());
    let mut ctx = PollContext::from_waker(&waker);

    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut ctx) {
            return output;
        }
        parker.park();
    }
}

/// Launches `f` on the current runtime and returns a handle to its result.
///
/// The current runtime is the one entered on this thread (runtime workers
/// enter their own), falling back to a process-wide default. `f` starts
/// right away; there is no admission control. A panic in `f` fails the
/// handle with [`TaskError::Panicked`].
pub fn spawn<F, R>(f: F) -> Handle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    match Context::try_current() {
        Some(pool) => spawn_on(&pool, f),
        None => Runtime::global().spawn(f),
    }
}

fn spawn_on<F, R>(pool: &Arc<Pool>, f: F) -> Handle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (slot, handle) = task::slot();
    tracing::trace!(task = std::any::type_name::<F>(), "spawn");

    pool.execute(Box::new(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(f)).map_err(TaskError::from_panic);
        slot.settle(result);
    }));

    handle
}

/// A pool of worker threads that runs tasks and continuations.
///
/// Dropping the runtime lets queued work finish; idle workers then exit.
pub struct Runtime {
    pool: Arc<Pool>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.pool.shutdown();
    }
}

impl Runtime {
    pub fn new() -> Self {
        Builder::new().build()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    fn global() -> &'static Runtime {
        static GLOBAL: OnceLock<Runtime> = OnceLock::new();
        GLOBAL.get_or_init(Runtime::new)
    }

    pub fn spawn<F, R>(&self, f: F) -> Handle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        spawn_on(&self.pool, f)
    }

    /// Like [`task::then`] but runs the continuation on this runtime.
    pub fn then<T, W, R>(&self, handle: Handle<T>, worker: W) -> Handle<R>
    where
        T: Send + 'static,
        W: FnOnce(Handle<T>) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.enter(|| task::then(handle, worker))
    }

    /// Runs `f` with this runtime as the target of the free functions
    /// ([`spawn`], [`task::then`], `when_any`, `when_all`).
    pub fn enter<T>(&self, f: impl FnOnce() -> T) -> T {
        let _enter = Context::enter(Arc::clone(&self.pool));
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    fn spawn_runs_eagerly() {
        let (slot, handle) = task::slot();
        let _started = spawn(move || slot.set(thread::current().id()));
        assert_ne!(handle.get().unwrap(), thread::current().id());
    }

    #[test]
    fn spawn_captures_panics() {
        let handle = spawn(|| -> u32 { panic!("task failed: {}", 3) });
        assert_eq!(handle.get(), Err(TaskError::Panicked("task failed: 3".into())));
    }

    #[test]
    fn enter_targets_runtime() {
        let runtime = Runtime::builder().thread_name("enter-test").build();

        let name = runtime.enter(|| spawn(|| thread::current().name().map(String::from)));
        assert!(name.join().unwrap().starts_with("enter-test-"));

        // nested spawns stay on the worker's runtime
        let nested = runtime.spawn(|| spawn(|| thread::current().name().map(String::from)).join());
        assert!(nested.join().unwrap().starts_with("enter-test-"));

        let outside = spawn(|| thread::current().name().map(String::from));
        assert!(outside.join().unwrap().starts_with("strand-worker-"));
    }

    #[test]
    fn then_on_runtime() {
        let runtime = Runtime::builder().thread_name("then-test").build();
        let handle = runtime.then(task::make_ready(20), |handle| {
            (handle.join() + 1, thread::current().name().map(String::from))
        });

        let (value, name) = handle.join();
        assert_eq!(value, 21);
        assert!(name.unwrap().starts_with("then-test-"));
    }

    #[test]
    fn work_survives_runtime_drop() {
        let runtime = Runtime::new();
        let handle = runtime.spawn(|| {
            thread::sleep(Duration::from_millis(20));
            7
        });
        drop(runtime);
        assert_eq!(handle.get(), Ok(7));
    }

    #[test]
    fn block_on_handle() {
        let handle = spawn(|| {
            thread::sleep(Duration::from_millis(10));
            "awaited"
        });
        assert_eq!(block_on(async move { handle.await }), Ok("awaited"));
    }
}
