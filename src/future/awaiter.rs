use std::rc::Rc;

use super::state::AnyFuture;
use super::Future;
use crate::error::Error;

/// What advancing a [`FutureAwaiter`] produced.
pub enum AwaiterStep<T> {
	/// The future is still pending; this is what the driven computation's
	/// `yield` surfaces to the task driver.
	Yield(Rc<dyn AnyFuture>),

	/// The future finished with a value — the standard "stop iteration
	/// with value" convention a computation uses to report its return.
	Stop(T),

	/// The future finished with an exception, to be raised into whatever
	/// is driving the awaiter.
	Raised(Error)
}

/// A single-shot lazy sequence adapter bound to one [`Future`].
///
/// This is the glue a driven computation uses to turn "await this future"
/// into the `yield`/`send`/`throw` protocol the task driver interprets.
/// Advancing it more than once while the future is still pending is a
/// computation bug (it means the computation `yield`ed the future raw
/// instead of awaiting/`yield from`-ing it) and panics rather than
/// returning an error, since it can only be triggered by the computation
/// implementation itself, never by the future's own state.
pub struct FutureAwaiter<T> {
	future: Option<Future<T>>,
	advanced: bool
}

impl<T: Clone + 'static> FutureAwaiter<T> {
	#[must_use]
	pub fn new(future: Future<T>) -> Self {
		Self { future: Some(future), advanced: false }
	}

	/// Advance the adapter, ignoring the sent-in value (the protocol this
	/// core implements never resumes an awaiter with a value — only the
	/// driven computation that `yield from`s it does).
	pub fn send(&mut self, _ignored: ()) -> AwaiterStep<T> {
		self.advance()
	}

	/// Drop the held future and propagate `exc` as the result of this
	/// advance.
	pub fn throw(&mut self, exc: Error) -> AwaiterStep<T> {
		self.future = None;

		AwaiterStep::Raised(exc)
	}

	/// Drop the held future without producing a final step.
	pub fn close(&mut self) {
		self.future = None;
	}

	fn advance(&mut self) -> AwaiterStep<T> {
		let future = match self.future.clone() {
			Some(future) => future,
			None => panic!("FutureAwaiter advanced after it already completed")
		};

		if !future.done() {
			assert!(
				!self.advanced,
				"yield was used instead of yield from for a future"
			);

			self.advanced = true;
			future.mark_blocking();

			return AwaiterStep::Yield(future.to_any());
		}

		self.future = None;

		match future.result() {
			Ok(value) => AwaiterStep::Stop(value),
			Err(exc) => AwaiterStep::Raised(exc)
		}
	}
}
