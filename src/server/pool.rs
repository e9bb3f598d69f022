//! Fixed-size worker pool.
//!
//! `N` named threads share one FIFO task queue guarded by a mutex and a
//! condition variable. Shutdown closes the queue, lets the workers finish
//! every task already queued, then joins them.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::server::error::Error;
use crate::server::log_sink::LogSink;

/// A unit of work for the pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    tasks: VecDeque<Task>,
    closed: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A pool of pre-started worker threads.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
    sink: Arc<LogSink>,
}

impl WorkerPool {
    /// Start `size` workers. Fails if `size` is zero or a thread cannot be
    /// spawned; workers already started are shut down in that case.
    pub fn new(size: usize, sink: Arc<LogSink>) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::InvalidPoolSize);
        }

        let pool = Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    tasks: VecDeque::new(),
                    closed: false,
                }),
                available: Condvar::new(),
            }),
            workers: Mutex::new(Vec::with_capacity(size)),
            size,
            sink,
        };

        for id in 0..size {
            let shared = Arc::clone(&pool.shared);
            let sink = Arc::clone(&pool.sink);
            let handle = thread::Builder::new()
                .name(format!("poolhttp-worker-{id}"))
                .spawn(move || work(id, shared, sink))?;
            pool.handles().push(handle);
        }

        pool.sink.debug(format!("Worker pool started with {size} threads"));
        Ok(pool)
    }

    fn handles(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a task for the next idle worker. Never runs it on the caller.
    pub fn enqueue<F>(&self, task: F) -> Result<(), Error>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.lock();
        if queue.closed {
            return Err(Error::PoolClosed);
        }
        queue.tasks.push_back(Box::new(task));
        drop(queue);
        self.shared.available.notify_one();
        Ok(())
    }

    /// The number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The number of tasks waiting for a worker.
    pub fn pending(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Refuse new tasks, run the queued ones to completion and join all
    /// workers. Calling it again is a no-op. When called from one of this
    /// pool's own tasks, that worker is left to exit on its own.
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.lock();
            if queue.closed && self.handles().is_empty() {
                return;
            }
            queue.closed = true;
        }
        self.shared.available.notify_all();

        let handles = std::mem::take(&mut *self.handles());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                self.sink.error("Worker thread exited abnormally");
            }
        }
        self.sink.debug("Worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn work(id: usize, shared: Arc<Shared>, sink: Arc<LogSink>) {
    loop {
        let task = {
            let mut queue = shared.lock();
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                if queue.closed {
                    return;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            sink.error(format!(
                "Task panicked on worker {id}: {}",
                panic_message(payload.as_ref())
            ));
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
