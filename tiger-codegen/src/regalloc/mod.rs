//! Liveness analysis and Appel's iterated-coalescing register allocator
//! (§4.G, §4.H).

pub mod alloc;
pub mod flowgraph;
pub mod graph;
pub mod liveness;

pub use alloc::{allocate, AllocationResult};
