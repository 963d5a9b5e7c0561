use crate::error::{Forwarded, TaskError};
use parking_lot::{Condvar, Mutex};
use std::{
    fmt,
    future::Future,
    mem,
    panic,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};

type Callback = Box<dyn FnOnce() + Send + 'static>;

enum State<T> {
    Pending {
        waker: Option<Waker>,
        callbacks: Vec<Callback>,
    },
    Ready(T),
    Failed(TaskError),
    Consumed,
}

impl<T> State<T> {
    fn pending() -> Self {
        Self::Pending {
            waker: None,
            callbacks: Vec::new(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "Pending",
            Self::Ready(_) => "Ready",
            Self::Failed(_) => "Failed",
            Self::Consumed => "Consumed",
        }
    }
}

struct Shared<T> {
    state: Mutex<State<T>>,
    settled: Condvar,
}

impl<T> Shared<T> {
    fn new(state: State<T>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            settled: Condvar::new(),
        })
    }

    fn settle(&self, result: Result<T, TaskError>) {
        let (waker, callbacks) = {
            let mut state = self.state.lock();
            let settled = match result {
                Ok(value) => State::Ready(value),
                Err(error) => State::Failed(error),
            };

            match mem::replace(&mut *state, settled) {
                State::Pending { waker, callbacks } => (waker, callbacks),
                previous => {
                    let name = previous.name();
                    *state = previous;
                    panic!("task slot settled twice (state: {})", name)
                }
            }
        };

        self.settled.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }

        // outside the lock: a callback may settle other handles
        for callback in callbacks {
            callback();
        }
    }

    fn take(state: &mut State<T>) -> Result<T, TaskError> {
        match mem::replace(state, State::Consumed) {
            State::Ready(value) => Ok(value),
            State::Failed(error) => Err(error),
            State::Consumed => panic!("task handle value retrieved more than once"),
            State::Pending { .. } => unreachable!("task handle taken while pending"),
        }
    }
}

/// Creates a connected pair of [`Slot`] and [`Handle`].
pub fn slot<T>() -> (Slot<T>, Handle<T>) {
    let shared = Shared::new(State::pending());
    let slot = Slot {
        shared: Some(shared.clone()),
    };
    (slot, Handle { shared })
}

/// Returns a handle that is already settled with `value`.
pub fn make_ready<T>(value: T) -> Handle<T> {
    Handle {
        shared: Shared::new(State::Ready(value)),
    }
}

/// Returns a handle that is already settled with `error`.
pub fn make_failed<T>(error: TaskError) -> Handle<T> {
    Handle {
        shared: Shared::new(State::Failed(error)),
    }
}

/// Unwraps a retrieval result, re-raising the failure as an unwind that
/// carries the original [`TaskError`].
pub(crate) fn forward<T>(result: Result<T, TaskError>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic::resume_unwind(Box::new(Forwarded(error))),
    }
}

/// The write-once producer side of a [`Handle`].
///
/// Dropping a `Slot` without settling it fails the handle with
/// [`TaskError::Broken`].
pub struct Slot<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Slot<T> {
    pub fn set(self, value: T) {
        self.settle(Ok(value))
    }

    pub fn fail(self, error: TaskError) {
        self.settle(Err(error))
    }

    pub fn settle(mut self, result: Result<T, TaskError>) {
        if let Some(shared) = self.shared.take() {
            shared.settle(result);
        }
    }
}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.settle(Err(TaskError::Broken));
        }
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").finish_non_exhaustive()
    }
}

/// The eventual result of a computation, retrievable exactly once.
///
/// A `Handle` is either pending or settled. Retrieval through [`get`] or
/// [`join`] consumes the handle and blocks the calling thread until the
/// producer settles it. A `Handle` is also a [`Future`] for callers that
/// would rather await it.
///
/// [`get`]: Handle::get
/// [`join`]: Handle::join
pub struct Handle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Handle<T> {
    /// Returns true once the producer has settled the handle.
    pub fn is_ready(&self) -> bool {
        !matches!(&*self.shared.state.lock(), State::Pending { .. })
    }

    /// Blocks until the handle is settled without retrieving the value.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock();
        while matches!(*state, State::Pending { .. }) {
            self.shared.settled.wait(&mut state);
        }
    }

    /// Blocks until settled and moves the result out.
    pub fn get(self) -> Result<T, TaskError> {
        let mut state = self.shared.state.lock();
        while matches!(*state, State::Pending { .. }) {
            self.shared.settled.wait(&mut state);
        }
        Shared::take(&mut state)
    }

    /// Like [`get`](Handle::get) but resumes unwinding on failure.
    ///
    /// The unwind carries the stored [`TaskError`], so a continuation that
    /// joins a failed upstream handle fails with the same error.
    pub fn join(self) -> T {
        forward(self.get())
    }

    /// Attaches `worker` to run once this handle settles.
    /// See [`then`](crate::task::then).
    pub fn then<W, R>(self, worker: W) -> Handle<R>
    where
        T: Send + 'static,
        W: FnOnce(Handle<T>) -> R + Send + 'static,
        R: Send + 'static,
    {
        super::then(self, worker)
    }

    /// Runs `callback` on the settling thread once this handle settles, or on
    /// the calling thread if it already has.
    pub(crate) fn on_settle<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if let State::Pending { callbacks, .. } = &mut *state {
            callbacks.push(Box::new(callback));
            return;
        }

        drop(state);
        callback();
    }
}

impl<T> Future for Handle<T> {
    type Output = Result<T, TaskError>;

    fn poll(self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        if let State::Pending { waker, .. } = &mut *state {
            let stale = match waker {
                Some(waker) => !waker.will_wake(ctx.waker()),
                None => true,
            };
            if stale {
                *waker = Some(ctx.waker().clone());
            }
            return Poll::Pending;
        }

        if let State::Consumed = &*state {
            panic!("Handle polled after completion");
        }

        Poll::Ready(Shared::take(&mut state))
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("state", &self.shared.state.lock().name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::block_on;
    use std::{thread, time::Duration};

    #[test]
    fn ready_and_failed() {
        assert_eq!(make_ready(5).get(), Ok(5));
        assert_eq!(make_failed::<u8>(TaskError::Broken).get(), Err(TaskError::Broken));
        assert!(make_ready(()).is_ready());
    }

    #[test]
    fn blocks_until_settled() {
        let (slot, handle) = slot();
        assert!(!handle.is_ready());

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            slot.set(String::from("done"));
        });

        handle.wait();
        assert!(handle.is_ready());
        assert_eq!(handle.get().unwrap(), "done");
        producer.join().unwrap();
    }

    #[test]
    fn dropped_slot_is_broken() {
        let (slot, handle) = slot::<u32>();
        drop(slot);
        assert_eq!(handle.get(), Err(TaskError::Broken));
    }

    #[test]
    fn failure_is_distinct_from_broken() {
        let (slot, handle) = slot::<u32>();
        slot.fail(TaskError::Panicked("bad input".into()));

        let error = handle.get().unwrap_err();
        assert!(error.is_panic());
        assert_eq!(error.to_string(), "task panicked: bad input");
    }

    #[test]
    fn join_forwards_the_error_as_payload() {
        let handle = make_failed::<u32>(TaskError::Broken);
        let payload = panic::catch_unwind(panic::AssertUnwindSafe(|| handle.join())).unwrap_err();
        assert_eq!(TaskError::from_panic(payload), TaskError::Broken);
    }

    #[test]
    fn settle_callbacks() {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        let (broken, dropped) = slot::<u32>();
        let (slot, handle) = slot::<u32>();

        let sent = tx.clone();
        handle.on_settle(move || sent.send("set").unwrap());
        let sent = tx.clone();
        dropped.on_settle(move || sent.send("broken").unwrap());
        assert!(rx.try_recv().is_err());

        slot.set(1);
        assert_eq!(rx.try_recv(), Ok("set"));
        drop(broken);
        assert_eq!(rx.try_recv(), Ok("broken"));

        // already settled: runs on the spot
        make_ready(2).on_settle(move || tx.send("ready").unwrap());
        assert_eq!(rx.try_recv(), Ok("ready"));

        assert_eq!(handle.get(), Ok(1));
        assert_eq!(dropped.get(), Err(TaskError::Broken));
    }

    #[test]
    #[should_panic(expected = "settled twice")]
    fn settling_twice_is_fatal() {
        let (slot, _handle) = slot::<u32>();
        let shared = slot.shared.clone().unwrap();
        slot.set(1);
        shared.settle(Ok(2));
    }

    #[test]
    fn await_handle() {
        let (slot, handle) = slot();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            slot.set(7);
        });

        assert_eq!(block_on(handle), Ok(7));
        producer.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "polled after completion")]
    fn polled_after_completion() {
        let mut handle = make_ready(1);
        assert_eq!(block_on(&mut handle), Ok(1));
        let _ = block_on(&mut handle);
    }
}
