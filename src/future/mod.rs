//! The building block of any asynchronous operation: a one-shot
//! value-or-exception cell with an observer list. (Not to be confused with
//! [`std::future::Future`] — this type has no `poll`; it is the cell a
//! [`crate::task::Task`] drives a computation against.)

mod awaiter;
mod state;

pub use awaiter::{AwaiterStep, FutureAwaiter};
pub use state::{CallbackId, Future};

pub(crate) use state::{AnyFuture, FutureOutcome};
