use std::{
    sync::atomic::{AtomicU8, Ordering},
    sync::Arc,
    task::Wake,
    thread::{self, Thread},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ParkState {
    Empty = 0,
    Waiting = 1,
    Notified = 2,
}

impl From<u8> for ParkState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Empty,
            1 => Self::Waiting,
            2 => Self::Notified,
            _ => unreachable!("invalid ParkState"),
        }
    }
}

/// Blocks the thread that created it until woken through its [`Waker`].
///
/// [`Waker`]: std::task::Waker
pub struct Parker {
    state: AtomicU8,
    thread: Thread,
}

impl Wake for Parker {
    fn wake(self: Arc<Self>) {
        self.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.unpark();
    }
}

impl Parker {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ParkState::Empty as u8),
            thread: thread::current(),
        }
    }

    pub fn park(&self) {
        if let Err(state) = self.state.compare_exchange(
            ParkState::Empty as u8,
            ParkState::Waiting as u8,
            Ordering::Acquire,
            Ordering::Acquire,
        ) {
            match ParkState::from(state) {
                ParkState::Notified => {
                    self.state.swap(ParkState::Empty as u8, Ordering::Acquire);
                    return;
                }
                state => unreachable!("invalid Parker state when waiting: {:?}", state),
            }
        }

        loop {
            thread::park();
            match ParkState::from(self.state.load(Ordering::Acquire)) {
                ParkState::Waiting => continue,
                ParkState::Notified => break,
                ParkState::Empty => unreachable!("invalid Parker state while waiting"),
            }
        }

        self.state.swap(ParkState::Empty as u8, Ordering::Acquire);
    }

    pub fn unpark(&self) {
        match ParkState::from(self.state.swap(ParkState::Notified as u8, Ordering::Release)) {
            ParkState::Waiting => self.thread.unpark(),
            ParkState::Empty | ParkState::Notified => {}
        }
    }
}
