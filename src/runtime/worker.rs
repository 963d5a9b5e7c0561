use super::{
    context::Context,
    pool::{Pool, PoolEvent},
};
use std::sync::Arc;

impl Pool {
    pub(super) fn run(self: &Arc<Self>, worker_id: usize) {
        let _enter = Context::enter(Arc::clone(self));
        self.emit(PoolEvent::WorkerSpawned { worker_id });

        loop {
            while let Some(job) = self.pop() {
                job();
            }

            if !self.park(worker_id) {
                break;
            }
        }
    }

    /// Waits for a job to be queued.
    ///
    /// Returns false when the worker should exit, either because the pool is
    /// shutting down or because it idled past `keep_alive` above the core
    /// thread count.
    fn park(&self, worker_id: usize) -> bool {
        let mut sync = self.sync.lock();
        if !self.injector.is_empty() {
            return true;
        }

        if sync.shutdown {
            sync.spawned -= 1;
            self.emit(PoolEvent::WorkerShutdown { worker_id });
            return false;
        }

        sync.idle += 1;
        self.emit(PoolEvent::WorkerIdling { worker_id });

        loop {
            let timed_out = self.cond.wait_for(&mut sync, self.keep_alive).timed_out();

            // `execute` already took us off the idle count when it notified
            if sync.notified > 0 {
                sync.notified -= 1;
                return true;
            }

            if sync.shutdown {
                sync.idle -= 1;
                sync.spawned -= 1;
                self.emit(PoolEvent::WorkerShutdown { worker_id });
                return false;
            }

            if timed_out && sync.spawned > self.core_threads {
                sync.idle -= 1;
                sync.spawned -= 1;
                self.emit(PoolEvent::WorkerRetired { worker_id });
                return false;
            }
        }
    }
}
