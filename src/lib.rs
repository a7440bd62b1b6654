#![doc = include_str!("../README.md")]
#![warn(missing_docs, missing_debug_implementations)]
mod config;
mod error;
mod pool_allocator;
mod scheduler;
mod thread_local;

pub use config::*;
pub use error::*;
pub use pool_allocator::*;
pub use scheduler::*;
pub use thread_local::*;
