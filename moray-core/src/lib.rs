#![allow(dead_code)]

pub mod common_tests;
pub mod data_structures;

// Re-export the consuming surface for convenience
pub use data_structures::{ConcurrentQueue, ConcurrentStack, MinHeap, Queue, Stack};
