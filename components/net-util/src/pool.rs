use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use lazy_static::lazy_static;
use prometheus::{register_int_gauge_vec, IntGaugeVec};

lazy_static! {
    static ref WORKER_PENDING_TASK_VEC: IntGaugeVec = register_int_gauge_vec!(
        "shardkv_worker_pending_task_total",
        "Pending tasks queued on a named background worker",
        &["name"]
    )
    .unwrap();
}

/// A unit of background work. `run` is called once per scheduled task, on
/// the worker's single background thread, so `R` never needs to be `Sync`.
pub trait Runnable: Send {
    type Task: Send + 'static;

    fn run(&mut self, task: Self::Task);

    /// Called once after the channel is closed and no more tasks remain.
    fn shutdown(&mut self) {}
}

pub enum ScheduleError<T> {
    Stopped(T),
}

impl<T> fmt::Debug for ScheduleError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScheduleError::Stopped(..)")
    }
}

impl<T> fmt::Display for ScheduleError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker has stopped")
    }
}

impl<T> std::error::Error for ScheduleError<T> {}

/// A cheaply cloneable handle used to push tasks onto a [`Worker`]'s queue.
pub struct Scheduler<T> {
    name: Arc<str>,
    sender: Sender<T>,
    pending: Arc<AtomicUsize>,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Scheduler {
            name: self.name.clone(),
            sender: self.sender.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<T: Send + 'static> Scheduler<T> {
    pub fn schedule(&self, task: T) -> Result<(), ScheduleError<T>> {
        self.sender.send(task).map_err(|e| ScheduleError::Stopped(e.0))?;
        let pending = self.pending.fetch_add(1, Ordering::Relaxed) + 1;
        WORKER_PENDING_TASK_VEC
            .with_label_values(&[&self.name])
            .set(pending as i64);
        Ok(())
    }
}

/// Owns a named background thread and the channel feeding it. Dropping the
/// last [`Scheduler`] closes the channel; the thread drains remaining tasks,
/// calls `shutdown`, then exits. `stop` waits for that to happen.
pub struct Worker {
    name: Arc<str>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn start<R>(name: impl Into<String>, mut runnable: R) -> (Worker, Scheduler<R::Task>)
    where
        R: Runnable + 'static,
    {
        let name: Arc<str> = Arc::from(name.into());
        let (tx, rx) = unbounded::<R::Task>();
        let pending = Arc::new(AtomicUsize::new(0));
        let thread_name = name.clone();
        let thread_pending = pending.clone();
        let handle = thread::Builder::new()
            .name(format!("worker-{thread_name}"))
            .spawn(move || {
                for task in rx {
                    runnable.run(task);
                    let remaining = thread_pending.fetch_sub(1, Ordering::Relaxed) - 1;
                    WORKER_PENDING_TASK_VEC
                        .with_label_values(&[&thread_name])
                        .set(remaining as i64);
                }
                runnable.shutdown();
            })
            .expect("failed to spawn worker thread");

        (
            Worker {
                name: name.clone(),
                handle: Some(handle),
            },
            Scheduler { name, sender: tx, pending },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocks until the worker's thread has drained its queue and exited.
    /// The caller must have dropped every [`Scheduler`] first, otherwise
    /// this blocks forever.
    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Several background threads draining the same task queue, for work where
/// one thread per connection would starve under load but order between
/// tasks does not matter. Construct with a factory so each thread gets its
/// own `Runnable` instance (typically cloned state behind an `Arc`).
pub struct WorkerPool {
    name: Arc<str>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start<R, F>(name: impl Into<String>, size: usize, make_runnable: F) -> (WorkerPool, Scheduler<R::Task>)
    where
        R: Runnable + 'static,
        F: Fn() -> R,
    {
        let name: Arc<str> = Arc::from(name.into());
        let size = size.max(1);
        let (tx, rx) = unbounded::<R::Task>();
        let pending = Arc::new(AtomicUsize::new(0));

        let handles = (0..size)
            .map(|i| {
                let rx = rx.clone();
                let mut runnable = make_runnable();
                let thread_name = name.clone();
                let thread_pending = pending.clone();
                thread::Builder::new()
                    .name(format!("worker-{thread_name}-{i}"))
                    .spawn(move || {
                        for task in rx {
                            runnable.run(task);
                            let remaining = thread_pending.fetch_sub(1, Ordering::Relaxed) - 1;
                            WORKER_PENDING_TASK_VEC
                                .with_label_values(&[&thread_name])
                                .set(remaining as i64);
                        }
                        runnable.shutdown();
                    })
                    .expect("failed to spawn worker-pool thread")
            })
            .collect();

        (WorkerPool { name: name.clone(), handles }, Scheduler { name, sender: tx, pending })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocks until every thread in the pool has drained the queue and
    /// exited. The caller must have dropped every [`Scheduler`] first.
    pub fn stop(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct Echo(mpsc::Sender<u32>);
    impl Runnable for Echo {
        type Task = u32;
        fn run(&mut self, task: u32) {
            self.0.send(task).unwrap();
        }
    }

    #[test]
    fn scheduled_tasks_run_in_order() {
        let (tx, rx) = mpsc::channel();
        let (worker, scheduler) = Worker::start("test", Echo(tx));
        scheduler.schedule(1).unwrap();
        scheduler.schedule(2).unwrap();
        scheduler.schedule(3).unwrap();
        drop(scheduler);
        worker.stop();
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn pool_drains_every_task_across_threads() {
        let (tx, rx) = mpsc::channel();
        let (pool, scheduler) = WorkerPool::start("test-pool", 4, move || Echo(tx.clone()));
        for i in 0..20 {
            scheduler.schedule(i).unwrap();
        }
        drop(scheduler);
        pool.stop();
        let mut received: Vec<_> = rx.iter().collect();
        received.sort_unstable();
        assert_eq!(received, (0..20).collect::<Vec<_>>());
    }
}
