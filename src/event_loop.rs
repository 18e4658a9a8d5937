//! The loop collaborator this core consumes but does not implement.
//!
//! Everything here is an interface onto a single-threaded event loop: FIFO
//! scheduling via [`EventLoop::call_soon`], a debug flag that gates source
//! traceback capture, and a sink for diagnostics the core cannot otherwise
//! report (see [`crate::diagnostics`]). A concrete, minimal implementation
//! lives in [`crate::reactor`] behind the `reactor` feature, purely so the
//! rest of the crate has something to run against in tests; production
//! users are expected to supply their own.

use std::fmt::{self, Debug, Formatter};

use crate::error::Error;

/// A diagnostic event the core could not deliver to any caller.
///
/// Constructed by [`crate::diagnostics`] when a future is dropped with an
/// unretrieved exception, or a task is dropped while still pending.
pub struct ExceptionContext {
	pub message: String,
	pub exception: Option<Error>,
	pub source_traceback: Option<String>
}

impl Debug for ExceptionContext {
	fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
		fmt.debug_struct("ExceptionContext")
			.field("message", &self.message)
			.field("exception", &self.exception)
			.field(
				"source_traceback",
				&self.source_traceback.as_ref().map(|_| "<captured>")
			)
			.finish()
	}
}

/// The abstract single-threaded loop this core drives itself on top of.
///
/// Implementations must be single-threaded: the core never synchronizes
/// access to futures or tasks beyond the invariant that everything touching
/// a given [`EventLoop`] runs on the same thread.
pub trait EventLoop {
	/// Schedule `callback` to run on a future iteration of the loop, in
	/// FIFO order relative to every other callback scheduled this way.
	fn call_soon(&self, callback: Box<dyn FnOnce()>);

	/// Whether the loop is running with debug instrumentation enabled.
	/// Gates whether futures capture a construction-site backtrace.
	fn get_debug(&self) -> bool {
		false
	}

	/// Report a diagnostic the core itself has no caller to hand it to.
	fn call_exception_handler(&self, context: ExceptionContext);
}

/// Returns an opaque identity for an `Rc<dyn EventLoop>`, used to compare
/// "is this the same loop" without requiring loops to implement equality
/// themselves. Two handles compare equal exactly when [`Rc::ptr_eq`] would.
#[must_use]
pub(crate) fn loop_key(event_loop: &std::rc::Rc<dyn EventLoop>) -> usize {
	(std::rc::Rc::as_ptr(event_loop) as *const ()) as usize
}
