//! Destruction-time reporting of unobserved exceptions and pending tasks.
//!
//! Mirrors the teacher's own fatal-error reporting in spirit (see its
//! `log` module), but routes through [`EventLoop::call_exception_handler`]
//! rather than printing directly, since the loop is the documented sink
//! for this information. If the handler itself panics, that panic is
//! caught and logged rather than allowed to unwind out of a `Drop` impl.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::event_loop::{EventLoop, ExceptionContext};

/// Hand `context` to `event_loop`'s exception handler, swallowing and
/// logging any panic the handler raises rather than letting it escape a
/// `Drop` impl.
pub(crate) fn report(event_loop: &Rc<dyn EventLoop>, context: ExceptionContext) {
	let result = catch_unwind(AssertUnwindSafe(|| {
		event_loop.call_exception_handler(context);
	}));

	if result.is_err() {
		log_unraisable("exception handler panicked while reporting a diagnostic");
	}
}

#[cfg(feature = "log")]
fn log_unraisable(message: &str) {
	log::error!(target: "task_engine::diagnostics", "{message}");
}

#[cfg(not(feature = "log"))]
fn log_unraisable(message: &str) {
	eprintln!("task_engine::diagnostics: {message}");
}
