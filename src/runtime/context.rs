use super::pool::Pool;
use std::{cell::RefCell, mem, sync::Arc};

thread_local!(static CURRENT: RefCell<Option<Arc<Pool>>> = RefCell::new(None));

/// Tracks the pool that free functions like [`spawn`](super::spawn) target on
/// this thread.
pub(crate) struct Context;

impl Context {
    pub fn enter(pool: Arc<Pool>) -> EnterGuard {
        let previous = CURRENT.with(|current| mem::replace(&mut *current.borrow_mut(), Some(pool)));
        EnterGuard { previous }
    }

    pub fn try_current() -> Option<Arc<Pool>> {
        CURRENT.with(|current| current.borrow().clone())
    }
}

pub(crate) struct EnterGuard {
    previous: Option<Arc<Pool>>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}
