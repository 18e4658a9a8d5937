//! Tasks: a driven computation wrapped in a [`Future`](crate::future::Future).
//!
//! A [`Task`] pairs a [`Computation`] with the step/wakeup trampoline in
//! `driver`, which resumes it each time the future it is currently
//! awaiting becomes done. See `original_source/Modules/_asynciomodule.c`'s
//! `TaskObj`/`task_step` for the design this was distilled from.

mod closure;
mod computation;
mod driver;
mod registry;
mod state;

pub use closure::ComputationFn;
pub use computation::{Computation, Step, Yield};
pub use registry::{all_tasks, all_tasks_for, current_task};
pub use state::{ForeignFuture, Task, TaskHandle};
