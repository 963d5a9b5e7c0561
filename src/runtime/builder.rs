use super::{pool::Pool, Runtime};
use std::{num::NonZeroUsize, time::Duration};

/// Configures and builds a [`Runtime`].
pub struct Builder {
    pub(super) max_threads: Option<NonZeroUsize>,
    pub(super) core_threads: Option<usize>,
    pub(super) keep_alive: Duration,
    pub(super) stack_size: Option<NonZeroUsize>,
    pub(super) thread_name: String,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub const DEFAULT_MAX_THREADS: usize = 1024;
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self {
            max_threads: None,
            core_threads: None,
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            stack_size: None,
            thread_name: String::from("strand-worker"),
        }
    }

    /// Upper bound on live worker threads.
    ///
    /// Continuations block the worker they run on while waiting, so a chain
    /// deeper than this bound waits for a worker to free up.
    pub fn max_threads(&mut self, max_threads: usize) -> &mut Self {
        self.max_threads = NonZeroUsize::new(max_threads);
        self
    }

    /// Number of workers that stay alive when idle. Defaults to the CPU count.
    pub fn core_threads(&mut self, core_threads: usize) -> &mut Self {
        self.core_threads = Some(core_threads);
        self
    }

    /// How long a non-core worker idles before exiting.
    pub fn keep_alive(&mut self, keep_alive: Duration) -> &mut Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn stack_size(&mut self, stack_size: usize) -> &mut Self {
        self.stack_size = NonZeroUsize::new(stack_size);
        self
    }

    pub fn thread_name(&mut self, thread_name: impl Into<String>) -> &mut Self {
        self.thread_name = thread_name.into();
        self
    }

    pub fn build(&self) -> Runtime {
        Runtime {
            pool: Pool::from_builder(self),
        }
    }
}
