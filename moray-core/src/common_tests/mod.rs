//! Reusable contract tests for the [`ConcurrentQueue`] and [`ConcurrentStack`]
//! seams.
//!
//! Integration suites across the workspace call these against the lock-free
//! containers and the locking/crossbeam baselines alike, so every implementor
//! is held to the same contract.
//!
//! [`ConcurrentQueue`]: crate::data_structures::ConcurrentQueue
//! [`ConcurrentStack`]: crate::data_structures::ConcurrentStack
