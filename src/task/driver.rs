//! The step/wakeup trampoline that drives a [`Task`]'s computation.
//!
//! Grounded in `task_step`/`task_wakeup`/`task_step_impl` in
//! `original_source/Modules/_asynciomodule.c`: resume the computation with
//! an optional injected exception, classify whatever it yields, and either
//! reschedule immediately (bare yield) or install a wakeup callback on
//! whatever future it is now awaiting.

use std::rc::Rc;

use super::computation::{Step, Yield};
use super::state::Awaiting;
use super::Task;
use crate::error::Error;
use crate::future::FutureOutcome;

impl<Output: 'static> Task<Output> {
	/// Resume the driven computation, optionally injecting `exc` instead of
	/// resuming normally, and react to whatever it does.
	pub(super) fn step(&self, exc: Option<Error>) {
		assert!(!self.inner.future.done(), "_step(): already done: {self:?}");

		let exc = if self.inner.must_cancel.get() {
			self.inner.must_cancel.set(false);
			Some(exc.unwrap_or_else(Error::cancelled))
		} else {
			exc
		};

		self.inner.awaiting.replace(None);

		let weak: std::rc::Weak<dyn super::state::TaskHandle> = Rc::downgrade(&self.inner);
		let _current = super::registry::CurrentGuard::push(&self.inner.event_loop, weak);

		let mut computation = self.inner.computation.borrow_mut();

		let Some(driven) = computation.as_mut() else {
			// The computation already finished and was cleared by a
			// previous step; nothing left to drive.
			return;
		};

		let outcome = driven.resume(exc);

		drop(computation);

		match outcome {
			Step::Returned(value) => {
				self.finish();
				let _ = self.inner.future.set_result(value);
			}
			Step::Raised(err) if err.is_cancelled() => {
				self.finish();
				self.inner.future.cancel();
			}
			Step::Raised(err) => {
				self.finish();
				let _ = self.inner.future.set_exception(err);
			}
			Step::Yielded(yielded) => self.handle_yield(yielded)
		}
	}

	/// Drop the computation and any in-flight `awaiting` link, breaking the
	/// task's half of any reference cycle with whatever it was last
	/// awaiting.
	fn finish(&self) {
		self.inner.computation.replace(None);
		self.inner.awaiting.replace(None);
	}

	fn handle_yield(&self, yielded: Yield) {
		match yielded {
			Yield::Future(future) => self.handle_native_future(future),
			Yield::Foreign(future) => self.handle_foreign_future(future),
			Yield::Empty => {
				let this = self.clone();

				self.inner.event_loop.call_soon(Box::new(move || this.step(None)));
			}
			Yield::Generator(repr) => {
				let message = format!(
					"yield was used instead of yield from for generator in task {self:?} with {repr}"
				);

				self.set_error_soon(Error::protocol(message));
			}
			Yield::Other(repr) => {
				self.set_error_soon(Error::protocol(format!("Task got bad yield: {repr}")));
			}
		}
	}

	fn handle_native_future(&self, future: Rc<dyn crate::future::AnyFuture>) {
		if future.identity() == self.identity() {
			self.set_error_soon(Error::protocol(format!(
				"Task cannot await on itself: {self:?}"
			)));
			return;
		}

		if !same_loop(&future.event_loop(), &self.inner.event_loop) {
			let fut_repr = future.debug_repr();

			self.set_error_soon(Error::protocol(format!(
				"Task {self:?} got Future {fut_repr} attached to a different loop"
			)));
			return;
		}

		if future.is_blocking() {
			future.clear_blocking();
		} else {
			let fut_repr = future.debug_repr();

			self.set_error_soon(Error::protocol(format!(
				"yield was used instead of yield from in task {self:?} with {fut_repr}"
			)));
			return;
		}

		self.inner
			.awaiting
			.replace(Some(Awaiting::Native(Rc::clone(&future))));

		// `awaiting` above already holds `future` strongly; capturing the
		// task strongly here too would form a cycle (task -> awaiting ->
		// future -> this wakeup -> task) that only unwinds once the future
		// resolves. Capture a weak handle instead, per the cycle-breaking
		// design this core follows.
		let weak = Rc::downgrade(&self.inner);
		let wakeup_future = Rc::clone(&future);

		future.add_wakeup(Box::new(move || {
			let Some(inner) = weak.upgrade() else { return };

			let exc = match wakeup_future.outcome() {
				FutureOutcome::Cancelled => Some(Error::cancelled()),
				FutureOutcome::Exception(err) => Some(err),
				FutureOutcome::Value | FutureOutcome::Pending => None
			};

			Task { inner }.step(exc);
		}));

		if self.inner.must_cancel.get() && future.cancel() {
			self.inner.must_cancel.set(false);
		}
	}

	fn handle_foreign_future(&self, future: Rc<dyn crate::task::ForeignFuture>) {
		// Probe the blocking hint before the loop check: a missing
		// `_asyncio_future_blocking` disqualifies the object as
		// future-compatible at all, so it is reported as "bad yield"
		// regardless of which loop it happens to be attached to (mirrors
		// `task_step_impl`'s dispatch order in the source this was
		// distilled from).
		match future.future_blocking() {
			Some(true) => future.set_future_blocking(false),
			Some(false) => {
				let fut_repr = future.debug_repr();

				self.set_error_soon(Error::protocol(format!(
					"yield was used instead of yield from in task {self:?} with {fut_repr}"
				)));
				return;
			}
			None => {
				let fut_repr = future.debug_repr();

				self.set_error_soon(Error::protocol(format!("Task got bad yield: {fut_repr}")));
				return;
			}
		}

		if !same_loop(&future.event_loop(), &self.inner.event_loop) {
			let fut_repr = future.debug_repr();

			self.set_error_soon(Error::protocol(format!(
				"Task {self:?} got Future {fut_repr} attached to a different loop"
			)));
			return;
		}

		self.inner
			.awaiting
			.replace(Some(Awaiting::Foreign(Rc::clone(&future))));

		// See the matching comment in `handle_native_future`: weak, not
		// strong, to avoid a cycle through `awaiting`.
		let weak = Rc::downgrade(&self.inner);
		let wakeup_future = Rc::clone(&future);

		future.add_done_callback(Box::new(move || {
			let Some(inner) = weak.upgrade() else { return };
			let exc = wakeup_future.result().err();

			Task { inner }.step(exc);
		}));

		if self.inner.must_cancel.get() && future.cancel() {
			self.inner.must_cancel.set(false);
		}
	}

	/// Schedule a follow-up step that injects `err`, rather than raising
	/// inline from inside whatever `call_soon` callback is currently
	/// running this step.
	fn set_error_soon(&self, err: Error) {
		let this = self.clone();

		self.inner
			.event_loop
			.call_soon(Box::new(move || this.step(Some(err))));
	}
}

fn same_loop(a: &Rc<dyn crate::event_loop::EventLoop>, b: &Rc<dyn crate::event_loop::EventLoop>) -> bool {
	crate::event_loop::loop_key(a) == crate::event_loop::loop_key(b)
}
