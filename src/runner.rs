//! Execution modes for fanning work out over rayon.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    /// `threads: None` uses the pool the caller is already running on
    /// (the global pool outside any `install`).
    Parallel { threads: Option<usize> },
}

impl Default for ExecMode {
    fn default() -> Self {
        Self::Parallel { threads: None }
    }
}

impl ExecMode {
    /// `0` means sequential; any other count gets a dedicated pool of that size.
    #[must_use]
    pub const fn from_threads(threads: usize) -> Self {
        if threads == 0 {
            Self::Sequential
        } else {
            Self::Parallel {
                threads: Some(threads),
            }
        }
    }

    /// Apply `f` to every item, returning results in input order.
    pub fn map_collect<T, U, F>(&self, name: &str, items: &[T], f: F) -> Vec<U>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        match *self {
            Self::Sequential => items.iter().map(f).collect(),
            Self::Parallel { threads: None } => items.par_iter().map(f).collect(),
            Self::Parallel {
                threads: Some(threads),
            } => match build_pool(name, threads) {
                Some(pool) => pool.install(|| items.par_iter().map(f).collect()),
                None => items.par_iter().map(f).collect(),
            },
        }
    }
}

/// Build a named pool, or `None` (logged) if the OS refuses the threads.
#[must_use]
pub fn build_pool(name: &str, threads: usize) -> Option<ThreadPool> {
    let prefix = name.to_string();
    ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(move |i| format!("{prefix}-{i}"))
        .build()
        .inspect_err(|e| log::warn!("cannot build {name} pool of {threads} threads ({e}); using the current pool"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_agree_and_keep_order() {
        let items: Vec<u32> = (0..500).collect();
        let expected: Vec<u32> = items.iter().map(|x| x * 3).collect();
        for mode in [
            ExecMode::Sequential,
            ExecMode::Parallel { threads: None },
            ExecMode::Parallel { threads: Some(3) },
        ] {
            assert_eq!(mode.map_collect("test", &items, |x| x * 3), expected, "{mode:?}");
        }
    }

    #[test]
    fn zero_threads_is_sequential() {
        assert_eq!(ExecMode::from_threads(0), ExecMode::Sequential);
        assert_eq!(
            ExecMode::from_threads(4),
            ExecMode::Parallel { threads: Some(4) }
        );
    }
}
