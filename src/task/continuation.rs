use super::Handle;
use crate::runtime;

/// A handle bundled with the work that consumes it once it settles.
///
/// Owned by exactly one scheduled job and run at most once.
pub(crate) struct Continuation<T, W> {
    handle: Handle<T>,
    worker: W,
}

impl<T, W, R> Continuation<T, W>
where
    W: FnOnce(Handle<T>) -> R,
{
    pub(crate) fn new(handle: Handle<T>, worker: W) -> Self {
        Self { handle, worker }
    }

    pub(crate) fn run(self) -> R {
        self.handle.wait();
        tracing::trace!(handle = ?self.handle, "continuation invoked");
        (self.worker)(self.handle)
    }
}

/// Schedules `worker` to run with `handle` once it settles.
///
/// Never blocks the caller: the wait happens on a runtime worker. The worker
/// receives the handle itself, settled but unconsumed, so it decides whether
/// to forward a failure (`join`) or recover from it (`get`). A panic inside
/// `worker` fails the returned handle.
pub fn then<T, W, R>(handle: Handle<T>, worker: W) -> Handle<R>
where
    T: Send + 'static,
    W: FnOnce(Handle<T>) -> R + Send + 'static,
    R: Send + 'static,
{
    let continuation = Continuation::new(handle, worker);
    runtime::spawn(move || continuation.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::TaskError, task::{make_failed, make_ready, slot}};
    use std::{thread, time::Duration};

    #[test]
    fn run_waits_then_invokes() {
        let (slot, handle) = slot();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            slot.set(21);
        });

        let continuation = Continuation::new(handle, |handle: Handle<i32>| handle.join() * 2);
        assert_eq!(continuation.run(), 42);
        producer.join().unwrap();
    }

    #[test]
    fn does_not_block_the_caller() {
        let (slot, handle) = slot::<u32>();
        let next = then(handle, |handle| handle.join() + 1);
        assert!(!next.is_ready());

        slot.set(1);
        assert_eq!(next.get(), Ok(2));
    }

    #[test]
    fn worker_can_recover() {
        let recovered = make_failed::<u32>(TaskError::Broken).then(|handle| match handle.get() {
            Ok(value) => value,
            Err(TaskError::Broken) => 0,
            Err(error) => panic!("unexpected {}", error),
        });
        assert_eq!(recovered.get(), Ok(0));
    }

    #[test]
    fn worker_panic_fails_the_result() {
        let handle = make_ready(1).then(|_| -> u32 { panic!("worker exploded") });
        assert_eq!(handle.get(), Err(TaskError::Panicked("worker exploded".into())));
    }
}
