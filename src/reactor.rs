//! A minimal reference [`EventLoop`], good enough to drive the crate's own
//! tests and doctests.
//!
//! This is deliberately not a real reactor: no I/O readiness, no timers,
//! just the FIFO `call_soon` queue the core actually depends on. Anyone
//! embedding this crate in a real event loop (an io_uring loop, a
//! thread-per-core runtime, whatever) is expected to implement
//! [`EventLoop`] themselves; this one exists so `cargo test` has
//! something to run against without pulling in an external runtime.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::event_loop::{EventLoop, ExceptionContext};

/// A single-threaded, run-to-completion task queue.
pub struct Reactor {
	queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
	debug: Cell<bool>
}

impl Default for Reactor {
	fn default() -> Self {
		Self::new()
	}
}

impl Reactor {
	#[must_use]
	pub fn new() -> Self {
		Self {
			queue: RefCell::new(VecDeque::new()),
			debug: Cell::new(false)
		}
	}

	#[must_use]
	pub fn with_debug(debug: bool) -> Self {
		let reactor = Self::new();

		reactor.debug.set(debug);
		reactor
	}

	/// Run every callback currently queued, plus any callback those
	/// callbacks themselves schedule, until the queue is empty.
	///
	/// Panics from a scheduled callback propagate; the reactor does not
	/// attempt to recover mid-drain.
	pub fn run_until_stalled(&self) {
		loop {
			let next = self.queue.borrow_mut().pop_front();

			let Some(callback) = next else {
				break;
			};

			callback();
		}
	}
}

impl EventLoop for Reactor {
	fn call_soon(&self, callback: Box<dyn FnOnce()>) {
		self.queue.borrow_mut().push_back(callback);
	}

	fn get_debug(&self) -> bool {
		self.debug.get()
	}

	fn call_exception_handler(&self, context: ExceptionContext) {
		#[cfg(feature = "log")]
		log::error!(target: "task_engine::reactor", "{context:?}");

		#[cfg(not(feature = "log"))]
		eprintln!("task_engine::reactor: {context:?}");
	}
}

/// Convenience: build a fresh [`Reactor`], hand it to `setup` so the
/// caller can spawn tasks or futures bound to it, then drain it to
/// completion.
pub fn run_until_stalled(setup: impl FnOnce(&Rc<dyn EventLoop>)) -> Rc<Reactor> {
	let reactor = Rc::new(Reactor::new());
	let as_loop: Rc<dyn EventLoop> = Rc::clone(&reactor) as Rc<dyn EventLoop>;

	setup(&as_loop);
	reactor.run_until_stalled();

	reactor
}
