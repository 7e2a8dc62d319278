//! Task trees.
//!
//! A [`TaskList`] runs declared [`Task`]s once, either strictly in order or
//! all at the same time, and publishes the live [`TaskStatus`] of each task.
//!
//! ```text
//! TaskList::builder().task(..).build()
//!   ↓ subscribe() / wait()      (first attachment starts the run)
//! run: merge context → drop disabled tasks → dispatch
//!   ↓ per task
//! skip? → skipped | pending → action (fire | future | progress | subtasks)
//!   ↓
//! complete | error ─→ on_task_error + ancestor sink
//!   ↓ after the loop
//! first_error() → on_success (if none) → on_done(failed)
//! ```
//!
//! Sequential lists stop running actions after the first failure but still
//! close the remaining tasks as complete. Concurrent lists run everything.

mod action;
mod context;
mod list;
mod status;
mod stream;

pub use action::{Task, TaskAction};
pub use context::TaskContext;
pub use list::{
    collect_outcome, ErrorSink, StatusStream, TaskFailure, TaskList, TaskListBuilder,
    TaskListOutcome,
};
pub use status::{all_done, first_error, Skipped, TaskStatus, ABORTED, FALLBACK_ERROR};
pub use stream::{last_update, task_stream, TaskStream, TaskUpdate};
