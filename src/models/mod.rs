//! Domain models for taskbreak.
//!
//! - [`Task`]: a user's unit of work. Tasks may point at a parent task, which is
//!   how breakdown results hang off the task they were generated from.
//! - [`Priority`]: low / medium / high, shared by tasks and parsed subtasks.
//! - [`NewTask`]: a resolved row for batch inserts inside one transaction.

mod task;

pub use task::*;
