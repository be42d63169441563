//! Bindery: Resumable Batch Generation of Chunked Document Variants
//!
//! A time-sliced generation pipeline: a durable queue of render work is
//! drained under a wall-clock budget by a single locked worker, output records
//! are deduplicated and packed into bounded chunks per variant, and partial
//! progress survives process restarts through a durable stash slot.

pub mod artifact;
pub mod builder;
pub mod config;
pub mod driver;
pub mod error;
pub mod lock;
pub mod logging;
pub mod queue;
pub mod renderer;
pub mod stash;
pub mod state;
pub mod types;
pub mod worker;
