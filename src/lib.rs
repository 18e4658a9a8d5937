//! A single-threaded future/task execution core.
//!
//! `task_engine` provides two collaborating pieces:
//!
//! - [`future`]: `Future<T>`, a one-shot value-or-exception cell with
//!   done-callback observers, modeled on `asyncio.Future`.
//! - [`task`]: `Task<Output>`, a [`future::Future`] driven to completion by
//!   repeatedly resuming a [`task::Computation`] and reacting to whatever
//!   future it yields, modeled on `asyncio.Task`.
//!
//! Both are bound to an [`event_loop::EventLoop`]: an externally supplied
//! FIFO scheduler and diagnostics sink. The crate ships a minimal
//! reference implementation of that trait, [`reactor::Reactor`], behind
//! the `reactor` feature, purely so its own tests have something to run
//! against; embedding this core in a real event loop means implementing
//! [`event_loop::EventLoop`] against that loop directly.
//!
//! Nothing here is `Send` or `Sync`. The whole core assumes a single
//! thread drives a given [`event_loop::EventLoop`] and everything bound to
//! it.

mod diagnostics;
pub mod error;
pub mod event_loop;
pub mod future;
#[cfg(feature = "reactor")]
pub mod reactor;
pub mod task;

pub use error::{Error, ErrorKind, Result};
pub use event_loop::EventLoop;
pub use future::Future;
pub use task::Task;
