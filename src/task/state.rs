use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

use super::computation::Computation;
use crate::error::Error;
use crate::event_loop::EventLoop;
use crate::future::{AnyFuture, Future};

/// The duck-typed capability set a foreign (not native to this core)
/// future-compatible object must provide.
///
/// Mirrors `{ _asyncio_future_blocking, _loop, add_done_callback, cancel,
/// result }` from the specification's external interfaces: a blocking
/// hint the driver can read and clear, the owning loop for the
/// cross-loop check, a way to install the wakeup callback, and a way to
/// request cancellation.
pub trait ForeignFuture {
	fn future_blocking(&self) -> Option<bool>;
	fn set_future_blocking(&self, value: bool);
	fn event_loop(&self) -> Rc<dyn EventLoop>;
	fn add_done_callback(&self, callback: Box<dyn FnOnce()>);
	fn cancel(&self) -> bool;
	fn result(&self) -> Result<(), Error>;
	fn debug_repr(&self) -> String;
}

pub(super) enum Awaiting {
	Native(Rc<dyn AnyFuture>),
	Foreign(Rc<dyn ForeignFuture>)
}

impl Awaiting {
	pub(super) fn cancel(&self) -> bool {
		match self {
			Self::Native(future) => future.cancel(),
			Self::Foreign(future) => future.cancel()
		}
	}
}

/// Type-erased view of a task, used by [`crate::task::registry`] so that
/// `current_task`/`all_tasks` do not need to know a task's `Output` type.
pub trait TaskHandle {
	fn done(&self) -> bool;
	fn cancelled(&self) -> bool;
	fn cancel(&self) -> bool;
	fn event_loop(&self) -> Rc<dyn EventLoop>;
	fn identity(&self) -> *const ();
}

pub(super) struct Inner<Output> {
	pub(super) future: Future<Output>,
	pub(super) computation: RefCell<Option<Box<dyn Computation<Output = Output>>>>,
	pub(super) awaiting: RefCell<Option<Awaiting>>,
	pub(super) must_cancel: Cell<bool>,
	pub(super) log_destroy_pending: Cell<bool>,
	pub(super) event_loop: Rc<dyn EventLoop>
}

impl<Output> Drop for Inner<Output> {
	fn drop(&mut self) {
		if !self.log_destroy_pending.get() || self.future.done() {
			return;
		}

		let context = crate::event_loop::ExceptionContext {
			message: "Task was destroyed but it is pending".to_owned(),
			exception: None,
			source_traceback: None
		};

		crate::diagnostics::report(&self.event_loop, context);
	}
}

impl<Output> Inner<Output> {
	/// Shared body of `Task::cancel`/`TaskHandle::cancel`, taking only
	/// `&self` so the type-erased registry path does not need a strong
	/// reference to call it.
	fn request_cancel(&self) -> bool {
		if self.future.done() {
			return false;
		}

		if let Some(awaiting) = self.awaiting.borrow().as_ref() {
			if awaiting.cancel() {
				return true;
			}
		}

		self.must_cancel.set(true);

		true
	}
}

impl<Output: 'static> TaskHandle for Inner<Output> {
	fn done(&self) -> bool {
		self.future.done()
	}

	fn cancelled(&self) -> bool {
		self.future.cancelled()
	}

	fn cancel(&self) -> bool {
		self.request_cancel()
	}

	fn event_loop(&self) -> Rc<dyn EventLoop> {
		Rc::clone(&self.event_loop)
	}

	fn identity(&self) -> *const () {
		(self as *const Self).cast::<()>()
	}
}

/// A future that additionally drives a computation to fulfil itself.
///
/// `Task<Output>` is, like [`Future`], a cheap reference-counted handle.
/// It exposes every [`Future`] operation (`result`, `exception`, `done`,
/// `cancelled`, `add_done_callback`, `remove_done_callback`) plus its own
/// overridden [`Task::cancel`].
pub struct Task<Output> {
	pub(super) inner: Rc<Inner<Output>>
}

impl<Output> Clone for Task<Output> {
	fn clone(&self) -> Self {
		Self { inner: Rc::clone(&self.inner) }
	}
}

impl<Output> Debug for Task<Output> {
	fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
		let label = if !self.inner.future.done() {
			"pending"
		} else if self.inner.future.cancelled() {
			"cancelled"
		} else {
			"finished"
		};

		write!(fmt, "<Task {label} at {:p}>", Rc::as_ptr(&self.inner))
	}
}

impl<Output: 'static> Task<Output> {
	/// Create a task driving `computation` on `event_loop`, registering it
	/// in the process-wide [`crate::task::registry`] and scheduling its
	/// first step.
	pub fn spawn(
		event_loop: Rc<dyn EventLoop>, computation: impl Computation<Output = Output> + 'static
	) -> Self {
		let inner = Rc::new(Inner {
			future: Future::new(Rc::clone(&event_loop)),
			computation: RefCell::new(Some(Box::new(computation))),
			awaiting: RefCell::new(None),
			must_cancel: Cell::new(false),
			log_destroy_pending: Cell::new(true),
			event_loop: Rc::clone(&event_loop)
		});

		super::registry::register(&inner);

		let task = Self { inner };
		let first = task.clone();

		event_loop.call_soon(Box::new(move || first.step(None)));

		task
	}

	pub(super) fn identity(&self) -> *const () {
		self.inner.future.identity()
	}

	#[must_use]
	pub fn done(&self) -> bool {
		self.inner.future.done()
	}

	#[must_use]
	pub fn cancelled(&self) -> bool {
		self.inner.future.cancelled()
	}

	pub fn result(&self) -> crate::error::Result<Output>
	where
		Output: Clone
	{
		self.inner.future.result()
	}

	pub fn exception(&self) -> crate::error::Result<Option<Error>>
	where
		Output: Clone
	{
		self.inner.future.exception()
	}

	pub fn add_done_callback(
		&self, callback: impl FnOnce(Future<Output>) + 'static
	) -> crate::future::CallbackId {
		self.inner.future.add_done_callback(callback)
	}

	pub fn remove_done_callback(&self, id: crate::future::CallbackId) -> usize {
		self.inner.future.remove_done_callback(id)
	}

	/// Request cancellation.
	///
	/// If the task is currently awaiting a future and that future can be
	/// cancelled synchronously, the cancellation lands immediately.
	/// Otherwise it is deferred: `must_cancel` is set and a `Cancelled`
	/// exception is injected into the computation on the next step.
	pub fn cancel(&self) -> bool {
		self.inner.request_cancel()
	}
}
