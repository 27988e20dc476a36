//! Process-wide worker thread budget for codec calls.
//!
//! The budget is computed once, on first use, from the CPU set the process may
//! run on, and reused by every session created afterwards.

use std::num::NonZeroUsize;
use std::sync::OnceLock;

static MAX_THREADS: OnceLock<NonZeroUsize> = OnceLock::new();

/// Maximum number of worker threads a single codec call may use.
///
/// Falls back to 1 (with a warning) when the available parallelism cannot be
/// determined.
pub fn max_threads() -> usize {
    init_max_threads().get()
}

/// Compute the thread budget if it has not been computed yet.
///
/// Idempotent and safe to call from any thread; concurrent first calls block
/// until one of them has stored the value.
pub fn init_max_threads() -> NonZeroUsize {
    *MAX_THREADS.get_or_init(|| detect(std::thread::available_parallelism()))
}

fn detect(available: std::io::Result<NonZeroUsize>) -> NonZeroUsize {
    match available {
        Ok(n) => {
            tracing::debug!(threads = n.get(), "codec thread budget");
            n
        }
        Err(e) => {
            tracing::warn!("could not get cpu count: using max_threads=1 ({e})");
            NonZeroUsize::MIN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_positive_and_stable() {
        let first = max_threads();
        assert!(first >= 1);
        assert_eq!(max_threads(), first);
        assert_eq!(init_max_threads().get(), first);
    }

    #[test]
    fn failure_degrades_to_single_thread() {
        let err = std::io::Error::new(std::io::ErrorKind::Unsupported, "no sysconf");
        assert_eq!(detect(Err(err)).get(), 1);
    }

    #[test]
    fn concurrent_initialization_agrees() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(max_threads))
            .collect();
        let values: Vec<usize> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        assert!(values.windows(2).all(|w| w[0] == w[1]));
    }
}
