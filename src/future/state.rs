use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

use crate::error::Error;
use crate::event_loop::EventLoop;

/// Token returned by [`Future::add_done_callback`], used to remove that
/// exact registration later.
///
/// The source this core was distilled from removes callbacks by value
/// equality; arbitrary Rust closures have no such equality, so each
/// registration is instead given a unique, cheaply comparable identity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CallbackId(u64);

type DoneCallback<T> = Box<dyn FnOnce(Future<T>)>;

enum Outcome<T> {
	Pending,
	Cancelled,
	Value(T),
	Exception(Error)
}

struct Inner<T> {
	outcome: Outcome<T>,
	observers: Vec<(CallbackId, DoneCallback<T>)>,
	next_id: u64,
	event_loop: Rc<dyn EventLoop>,
	blocking: Cell<bool>,
	log_tb: Cell<bool>,
	source_tb: Option<Backtrace>
}

impl<T> Drop for Inner<T> {
	fn drop(&mut self) {
		if !self.log_tb.get() {
			return;
		}

		let Outcome::Exception(exception) = &self.outcome else {
			return;
		};

		let context = crate::event_loop::ExceptionContext {
			message: "Future exception was never retrieved".to_owned(),
			exception: Some(exception.clone()),
			source_traceback: self.source_tb.as_ref().map(ToString::to_string)
		};

		crate::diagnostics::report(&self.event_loop, context);
	}
}

/// A one-shot value-or-exception cell.
///
/// `Future<T>` is a cheap, reference-counted handle: cloning it does not
/// duplicate state, it shares it. There is no internal locking because the
/// whole core is single-threaded by contract (see the crate's concurrency
/// model); `Future` is intentionally `!Send`.
pub struct Future<T>(Rc<RefCell<Inner<T>>>);

impl<T> Clone for Future<T> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<T> Debug for Future<T> {
	fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
		let state = self.0.borrow();

		let label = match &state.outcome {
			Outcome::Pending => "PENDING",
			Outcome::Cancelled => "CANCELLED",
			Outcome::Value(_) => "FINISHED",
			Outcome::Exception(_) => "FINISHED"
		};

		write!(fmt, "<Future {label} at {:p}>", Rc::as_ptr(&self.0))
	}
}

impl<T> Future<T> {
	/// Create a new, `Pending` future bound to `event_loop`.
	///
	/// If `event_loop.get_debug()` is true at construction, a backtrace is
	/// captured for inclusion in any later diagnostic.
	#[must_use]
	pub fn new(event_loop: Rc<dyn EventLoop>) -> Self {
		let source_tb = event_loop.get_debug().then(Backtrace::capture);

		Self(Rc::new(RefCell::new(Inner {
			outcome: Outcome::Pending,
			observers: Vec::new(),
			next_id: 0,
			event_loop,
			blocking: Cell::new(false),
			log_tb: Cell::new(false),
			source_tb
		})))
	}

	#[must_use]
	pub fn done(&self) -> bool {
		!matches!(self.0.borrow().outcome, Outcome::Pending)
	}

	#[must_use]
	pub fn cancelled(&self) -> bool {
		matches!(self.0.borrow().outcome, Outcome::Cancelled)
	}

	/// Complete the future with a cancellation. Returns `false` if the
	/// future was already done.
	pub fn cancel(&self) -> bool {
		{
			let mut state = self.0.borrow_mut();

			if !matches!(state.outcome, Outcome::Pending) {
				return false;
			}

			state.outcome = Outcome::Cancelled;
		}

		self.drain_observers();

		true
	}

	/// Complete the future with `value`. Fails if it was not `Pending`.
	pub fn set_result(&self, value: T) -> crate::error::Result<()> {
		{
			let mut state = self.0.borrow_mut();

			if !matches!(state.outcome, Outcome::Pending) {
				return Err(Error::invalid_state("future is not pending"));
			}

			state.outcome = Outcome::Value(value);
		}

		self.drain_observers();

		Ok(())
	}

	/// Complete the future with an exception. Fails if it was not
	/// `Pending`.
	///
	/// The source this core was distilled from additionally rejects
	/// non-exception values and the engine's own "stop iteration" marker
	/// at this point; in this port that distinction is enforced
	/// statically, since `Error` and a computation's return value are
	/// different Rust types and there is no way to call this function with
	/// the wrong one (see `DESIGN.md`).
	pub fn set_exception(&self, exception: Error) -> crate::error::Result<()> {
		{
			let mut state = self.0.borrow_mut();

			if !matches!(state.outcome, Outcome::Pending) {
				return Err(Error::invalid_state("future is not pending"));
			}

			state.outcome = Outcome::Exception(exception);
			state.log_tb.set(true);
		}

		self.drain_observers();

		Ok(())
	}

	/// Register `callback` to run once the future is done, returning a
	/// token that can later be passed to [`Future::remove_done_callback`].
	///
	/// If the future is already done, `callback` is scheduled immediately
	/// via the loop's `call_soon` rather than run inline.
	pub fn add_done_callback(&self, callback: impl FnOnce(Future<T>) + 'static) -> CallbackId {
		let id = {
			let mut state = self.0.borrow_mut();
			let id = CallbackId(state.next_id);

			state.next_id += 1;

			if matches!(state.outcome, Outcome::Pending) {
				state.observers.push((id, Box::new(callback)));
				return id;
			}

			id
		};

		let this = self.clone();
		let event_loop = Rc::clone(&self.0.borrow().event_loop);

		event_loop.call_soon(Box::new(move || callback(this)));

		id
	}

	/// Remove every (there is at most one) registration matching `id`.
	/// Returns the number removed: `1` if found, `0` otherwise — including
	/// if called again with an already-removed id.
	pub fn remove_done_callback(&self, id: CallbackId) -> usize {
		let mut state = self.0.borrow_mut();
		let before = state.observers.len();

		state.observers.retain(|(observer_id, _)| *observer_id != id);

		before - state.observers.len()
	}

	fn drain_observers(&self) {
		let (observers, event_loop) = {
			let mut state = self.0.borrow_mut();

			(
				std::mem::take(&mut state.observers),
				Rc::clone(&state.event_loop)
			)
		};

		for (_, callback) in observers {
			let this = self.clone();

			event_loop.call_soon(Box::new(move || callback(this)));
		}
	}

	pub(crate) fn mark_blocking(&self) {
		self.0.borrow().blocking.set(true);
	}

	pub(crate) fn is_blocking(&self) -> bool {
		self.0.borrow().blocking.get()
	}

	pub(crate) fn clear_blocking(&self) {
		self.0.borrow().blocking.set(false);
	}

	pub(crate) fn event_loop(&self) -> Rc<dyn EventLoop> {
		Rc::clone(&self.0.borrow().event_loop)
	}

	pub(crate) fn identity(&self) -> *const () {
		Rc::as_ptr(&self.0).cast::<()>()
	}
}

impl<T: Clone> Future<T> {
	/// Retrieve the stored value, re-raise the stored exception, or raise
	/// `Cancelled`/`InvalidState` per the future's current state.
	///
	/// Clears the "unretrieved exception" diagnostic flag on every call
	/// that observes a stored exception, matching the source semantics
	/// where retrieval is itself what silences the destructor warning.
	pub fn result(&self) -> crate::error::Result<T> {
		let state = self.0.borrow();

		match &state.outcome {
			Outcome::Pending => Err(Error::invalid_state("future is not done")),
			Outcome::Cancelled => Err(Error::cancelled()),
			Outcome::Exception(err) => {
				state.log_tb.set(false);

				Err(err.clone())
			}
			Outcome::Value(value) => {
				state.log_tb.set(false);

				Ok(value.clone())
			}
		}
	}

	/// Retrieve the stored exception, if any, or raise
	/// `Cancelled`/`InvalidState` per the future's current state.
	pub fn exception(&self) -> crate::error::Result<Option<Error>> {
		let state = self.0.borrow();

		match &state.outcome {
			Outcome::Pending => Err(Error::invalid_state("future is not done")),
			Outcome::Cancelled => Err(Error::cancelled()),
			Outcome::Exception(err) => {
				state.log_tb.set(false);

				Ok(Some(err.clone()))
			}
			Outcome::Value(_) => Ok(None)
		}
	}
}

/// Type-erased operations the task driver needs on whatever future a
/// computation yields, regardless of its value type.
///
/// Modeled as an explicit capability interface per the design notes:
/// `Native` futures implement this directly; `Foreign` (duck-typed)
/// futures go through [`crate::task::ForeignFuture`] instead and are
/// classified once at suspension time.
pub(crate) trait AnyFuture {
	fn event_loop(&self) -> Rc<dyn EventLoop>;
	fn is_blocking(&self) -> bool;
	fn clear_blocking(&self);
	fn add_wakeup(&self, callback: Box<dyn FnOnce()>);
	fn cancel(&self) -> bool;
	fn outcome(&self) -> FutureOutcome;
	fn identity(&self) -> *const ();
	fn debug_repr(&self) -> String;
}

pub(crate) enum FutureOutcome {
	Pending,
	Cancelled,
	Value,
	Exception(Error)
}

impl<T: 'static> AnyFuture for Future<T> {
	fn event_loop(&self) -> Rc<dyn EventLoop> {
		Future::event_loop(self)
	}

	fn is_blocking(&self) -> bool {
		Future::is_blocking(self)
	}

	fn clear_blocking(&self) {
		Future::clear_blocking(self);
	}

	fn add_wakeup(&self, callback: Box<dyn FnOnce()>) {
		self.add_done_callback(move |_| callback());
	}

	fn cancel(&self) -> bool {
		Future::cancel(self)
	}

	fn outcome(&self) -> FutureOutcome {
		let state = self.0.borrow();

		match &state.outcome {
			Outcome::Pending => FutureOutcome::Pending,
			Outcome::Cancelled => FutureOutcome::Cancelled,
			Outcome::Value(_) => FutureOutcome::Value,
			Outcome::Exception(err) => {
				state.log_tb.set(false);

				FutureOutcome::Exception(err.clone())
			}
		}
	}

	fn identity(&self) -> *const () {
		Rc::as_ptr(&self.0).cast::<()>()
	}

	fn debug_repr(&self) -> String {
		format!("{self:?}")
	}
}

impl<T: 'static> Future<T> {
	/// Erase `T` so this future can be handed to the task driver as
	/// whatever a computation yielded.
	pub(crate) fn to_any(&self) -> Rc<dyn AnyFuture> {
		Rc::new(self.clone())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	struct Inline;

	impl EventLoop for Inline {
		fn call_soon(&self, callback: Box<dyn FnOnce()>) {
			callback();
		}

		fn call_exception_handler(&self, _context: crate::event_loop::ExceptionContext) {}
	}

	fn event_loop() -> Rc<dyn EventLoop> {
		Rc::new(Inline)
	}

	#[test]
	fn pending_then_resolved() {
		let future = Future::new(event_loop());

		assert!(!future.done());
		future.set_result(10).unwrap();
		assert!(future.done());
		assert_eq!(future.result().unwrap(), 10);
	}

	#[test]
	fn cancel_is_idempotent_false_on_second_call() {
		let future: Future<()> = Future::new(event_loop());

		assert!(future.cancel());
		assert!(!future.cancel());
	}

	#[test]
	fn remove_done_callback_is_zero_for_unknown_id() {
		let future: Future<()> = Future::new(event_loop());
		let id = future.add_done_callback(|_| {});

		assert_eq!(future.remove_done_callback(id), 1);
		assert_eq!(future.remove_done_callback(id), 0);
	}

	#[test]
	fn blocking_flag_round_trips() {
		let future: Future<()> = Future::new(event_loop());

		assert!(!future.is_blocking());
		future.mark_blocking();
		assert!(future.is_blocking());
		future.clear_blocking();
		assert!(!future.is_blocking());
	}
}
