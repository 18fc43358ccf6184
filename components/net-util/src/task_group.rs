//! A bounded, awaited group of closures, replacing the reference
//! implementation's pattern of spawning one detached thread per peer and
//! never joining it. The master coordinator uses this to fan a
//! redistribution out to every existing shard and only clear its
//! `manage_block` gate once every fan-out task has actually finished.

/// Runs `tasks` with at most `max_concurrency` running at once, and blocks
/// until all of them have completed. Panics inside a task are propagated to
/// the caller once every task has finished, matching `thread::scope`'s own
/// behavior.
pub fn run_bounded_and_join<F>(tasks: Vec<F>, max_concurrency: usize)
where
    F: FnOnce() + Send,
{
    let max_concurrency = max_concurrency.max(1);
    std::thread::scope(|scope| {
        let mut in_flight = Vec::with_capacity(max_concurrency);
        for task in tasks {
            if in_flight.len() >= max_concurrency {
                let handle = in_flight.remove(0);
                let _: () = scope_join(handle);
            }
            in_flight.push(scope.spawn(task));
        }
        for handle in in_flight {
            scope_join(handle);
        }
    });
}

fn scope_join<'scope, T>(handle: std::thread::ScopedJoinHandle<'scope, T>) -> T {
    match handle.join() {
        Ok(v) => v,
        Err(e) => std::panic::resume_unwind(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn all_tasks_complete_before_returning() {
        let counter = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();
        run_bounded_and_join(tasks, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }
}
