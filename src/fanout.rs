//! Bounded scoped fan-out.
//!
//! Runs a closure over a slice on at most `limit` threads and returns the
//! results in input order, whatever order the workers finish in. Workers pull
//! the next index from a shared counter, so a slow item only occupies its own
//! worker while the others keep draining the slice.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

pub fn map_bounded<T, R, F>(items: &[T], limit: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    let workers = limit.max(1).min(items.len());
    let next = AtomicUsize::new(0);
    let (f, next) = (&f, &next);
    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(item) = items.get(index) else { break };
                        done.push((index, f(index, item)));
                    }
                    done
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(done) => {
                    for (index, result) in done {
                        slots[index] = Some(result);
                    }
                }
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    });

    // Every index below items.len() was claimed by exactly one worker.
    slots.into_iter().flatten().collect()
}
