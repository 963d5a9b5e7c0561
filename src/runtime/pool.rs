use super::builder::Builder;
use crossbeam_deque::{Injector, Steal};
use parking_lot::{Condvar, Mutex};
use std::{
    hint::spin_loop,
    io,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug)]
pub(crate) enum PoolEvent {
    JobQueued {
        spawned: usize,
        idle: usize,
    },
    Saturated {
        spawned: usize,
    },
    WorkerSpawned {
        worker_id: usize,
    },
    WorkerIdling {
        worker_id: usize,
    },
    WorkerRetired {
        worker_id: usize,
    },
    WorkerShutdown {
        worker_id: usize,
    },
    WorkerFailed {
        worker_id: usize,
        error: io::Error,
    },
    JobsDropped {
        count: usize,
    },
}

#[derive(Debug, Default)]
pub(super) struct Sync {
    pub spawned: usize,
    pub idle: usize,
    pub notified: usize,
    pub shutdown: bool,
}

/// An elastic set of worker threads fed from one shared injector queue.
///
/// Every queued job either wakes an idle worker or spawns a new one, up to
/// `max_threads`. Jobs may block their worker indefinitely (continuations
/// wait on their upstream handle), so a job never waits behind another job
/// while the pool has room to grow.
pub(crate) struct Pool {
    pub(super) injector: Injector<Job>,
    pub(super) sync: Mutex<Sync>,
    pub(super) cond: Condvar,
    pub(super) max_threads: usize,
    pub(super) core_threads: usize,
    pub(super) keep_alive: Duration,
    stack_size: Option<NonZeroUsize>,
    thread_name: String,
    next_id: AtomicUsize,
}

impl Pool {
    pub fn from_builder(builder: &Builder) -> Arc<Pool> {
        let max_threads = builder
            .max_threads
            .map(NonZeroUsize::get)
            .unwrap_or(Builder::DEFAULT_MAX_THREADS);

        let core_threads = builder
            .core_threads
            .unwrap_or_else(num_cpus::get)
            .min(max_threads);

        Arc::new(Self {
            injector: Injector::new(),
            sync: Mutex::new(Sync::default()),
            cond: Condvar::new(),
            max_threads,
            core_threads,
            keep_alive: builder.keep_alive,
            stack_size: builder.stack_size,
            thread_name: builder.thread_name.clone(),
            next_id: AtomicUsize::new(0),
        })
    }

    pub(crate) fn emit(&self, event: PoolEvent) {
        match event {
            PoolEvent::JobQueued { spawned, idle } => tracing::trace!(spawned, idle, "job queued"),
            PoolEvent::Saturated { spawned } => {
                tracing::debug!(spawned, "pool saturated, job waits for a free worker")
            }
            PoolEvent::WorkerSpawned { worker_id } => tracing::debug!(worker_id, "worker spawned"),
            PoolEvent::WorkerIdling { worker_id } => tracing::trace!(worker_id, "worker idling"),
            PoolEvent::WorkerRetired { worker_id } => {
                tracing::debug!(worker_id, "worker retired after keep-alive")
            }
            PoolEvent::WorkerShutdown { worker_id } => tracing::debug!(worker_id, "worker shut down"),
            PoolEvent::WorkerFailed { worker_id, error } => {
                tracing::error!(worker_id, %error, "failed to spawn worker thread")
            }
            PoolEvent::JobsDropped { count } => {
                tracing::error!(count, "no worker available, dropped queued jobs")
            }
        }
    }

    pub fn execute(self: &Arc<Self>, job: Job) {
        self.injector.push(job);

        let mut sync = self.sync.lock();
        self.emit(PoolEvent::JobQueued {
            spawned: sync.spawned,
            idle: sync.idle,
        });

        if sync.idle > 0 {
            sync.idle -= 1;
            sync.notified += 1;
            drop(sync);
            self.cond.notify_one();
            return;
        }

        if sync.spawned >= self.max_threads {
            self.emit(PoolEvent::Saturated {
                spawned: sync.spawned,
            });
            return;
        }

        sync.spawned += 1;
        drop(sync);

        let worker_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Err(error) = self.spawn_worker(worker_id) {
            self.emit(PoolEvent::WorkerFailed { worker_id, error });

            let mut sync = self.sync.lock();
            sync.spawned -= 1;
            let orphaned = sync.spawned == 0;
            drop(sync);

            // Nobody is left to run the queue, so fail its handles instead of
            // leaving them pending forever.
            if orphaned {
                let count = std::iter::from_fn(|| self.pop()).count();
                self.emit(PoolEvent::JobsDropped { count });
            }
        }
    }

    fn spawn_worker(self: &Arc<Self>, worker_id: usize) -> io::Result<()> {
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.thread_name, worker_id));
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size.get());
        }

        let pool = Arc::clone(self);
        builder.spawn(move || pool.run(worker_id))?;
        Ok(())
    }

    pub fn pop(&self) -> Option<Job> {
        loop {
            match self.injector.steal() {
                Steal::Success(job) => return Some(job),
                Steal::Empty => return None,
                Steal::Retry => spin_loop(),
            }
        }
    }

    pub fn shutdown(&self) {
        self.sync.lock().shutdown = true;
        self.cond.notify_all();
    }
}
