use std::cell::{Cell, RefCell};
use std::rc::Rc;

use task_engine::error::Error;
use task_engine::event_loop::EventLoop;
use task_engine::future::{AwaiterStep, FutureAwaiter};
use task_engine::reactor::Reactor;
use task_engine::task::{all_tasks, current_task, ComputationFn, ForeignFuture, Step, Task, Yield};
use task_engine::Future;

fn reactor() -> (Rc<Reactor>, Rc<dyn EventLoop>) {
	let reactor = Rc::new(Reactor::new());
	let as_loop: Rc<dyn EventLoop> = Rc::clone(&reactor) as Rc<dyn EventLoop>;

	(reactor, as_loop)
}

#[test]
fn task_that_returns_immediately() {
	let (reactor, event_loop) = reactor();

	let task = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(|_exc| Step::Returned(5))
	);

	assert!(!task.done());
	reactor.run_until_stalled();

	assert!(task.done());
	assert_eq!(task.result().unwrap(), 5);
}

#[test]
fn task_that_raises_immediately() {
	let (reactor, event_loop) = reactor();

	let task: Task<()> = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(|_exc| Step::Raised(task_engine::Error::type_error("bad")))
	);

	reactor.run_until_stalled();

	let err = task.result().unwrap_err();
	assert_eq!(err.kind(), task_engine::ErrorKind::TypeError);
}

#[test]
fn task_awaiting_a_future_resumes_on_completion() {
	let (reactor, event_loop) = reactor();
	let inner_future: Future<i32> = Future::new(Rc::clone(&event_loop));

	let awaiter = Rc::new(RefCell::new(None::<FutureAwaiter<i32>>));
	let awaiter_clone = Rc::clone(&awaiter);
	let inner_for_task = inner_future.clone();

	let task = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(move |exc| {
			let mut slot = awaiter_clone.borrow_mut();

			if slot.is_none() {
				*slot = Some(FutureAwaiter::new(inner_for_task.clone()));
			}

			let step = if let Some(exc) = exc {
				slot.as_mut().unwrap().throw(exc)
			} else {
				slot.as_mut().unwrap().send(())
			};

			match step {
				AwaiterStep::Yield(fut) => Step::Yielded(Yield::Future(fut)),
				AwaiterStep::Stop(value) => Step::Returned(value * 2),
				AwaiterStep::Raised(err) => Step::Raised(err)
			}
		})
	);

	reactor.run_until_stalled();
	assert!(!task.done(), "task should be suspended awaiting the future");

	inner_future.set_result(21).unwrap();
	reactor.run_until_stalled();

	assert!(task.done());
	assert_eq!(task.result().unwrap(), 42);
}

#[test]
fn cancel_before_first_step_injects_cancelled() {
	let (reactor, event_loop) = reactor();
	let saw_cancel = Rc::new(std::cell::Cell::new(false));
	let saw_cancel_clone = Rc::clone(&saw_cancel);

	let task: Task<()> = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(move |exc| {
			if let Some(exc) = exc {
				saw_cancel_clone.set(exc.is_cancelled());
				Step::Raised(exc)
			} else {
				Step::Returned(())
			}
		})
	);

	assert!(task.cancel());
	reactor.run_until_stalled();

	assert!(task.cancelled());
	assert!(saw_cancel.get());
}

#[test]
fn cancel_while_awaiting_forwards_to_the_awaited_future() {
	let (reactor, event_loop) = reactor();
	let inner_future: Future<i32> = Future::new(Rc::clone(&event_loop));
	let inner_for_task = inner_future.clone();
	let awaiter = Rc::new(RefCell::new(None::<FutureAwaiter<i32>>));
	let awaiter_clone = Rc::clone(&awaiter);

	let task = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(move |exc| {
			let mut slot = awaiter_clone.borrow_mut();

			if slot.is_none() {
				*slot = Some(FutureAwaiter::new(inner_for_task.clone()));
			}

			let step = if let Some(exc) = exc {
				slot.as_mut().unwrap().throw(exc)
			} else {
				slot.as_mut().unwrap().send(())
			};

			match step {
				AwaiterStep::Yield(fut) => Step::Yielded(Yield::Future(fut)),
				AwaiterStep::Stop(value) => Step::Returned(value),
				AwaiterStep::Raised(err) => Step::Raised(err)
			}
		})
	);

	reactor.run_until_stalled();
	assert!(!task.done());

	assert!(task.cancel());
	assert!(inner_future.cancelled());

	reactor.run_until_stalled();

	assert!(task.done());
	assert!(task.cancelled());
}

#[test]
fn bad_yield_is_a_protocol_violation() {
	let (reactor, event_loop) = reactor();

	let task: Task<()> = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(|exc| {
			if let Some(exc) = exc {
				Step::Raised(exc)
			} else {
				Step::Yielded(Yield::Other("42".to_owned()))
			}
		})
	);

	reactor.run_until_stalled();

	let err = task.result().unwrap_err();
	assert_eq!(err.kind(), task_engine::ErrorKind::Protocol);
	assert!(err.to_string().contains("bad yield"));
}

#[test]
fn bare_yield_reschedules_without_finishing() {
	let (reactor, event_loop) = reactor();
	let steps = Rc::new(std::cell::Cell::new(0));
	let steps_clone = Rc::clone(&steps);

	let task = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(move |_exc| {
			let n = steps_clone.get() + 1;
			steps_clone.set(n);

			if n < 3 {
				Step::Yielded(Yield::Empty)
			} else {
				Step::Returned(n)
			}
		})
	);

	reactor.run_until_stalled();

	assert_eq!(steps.get(), 3);
	assert_eq!(task.result().unwrap(), 3);
}

/// A minimal stand-in for a future-compatible object that is not native to
/// this crate, exercising the duck-typed suspension path (§4.4.3).
struct ForeignStub {
	event_loop: Rc<dyn EventLoop>,
	blocking: Cell<Option<bool>>,
	error: RefCell<Option<Error>>,
	callback: RefCell<Option<Box<dyn FnOnce()>>>
}

impl ForeignStub {
	fn new(event_loop: Rc<dyn EventLoop>) -> Rc<Self> {
		Rc::new(Self {
			event_loop,
			blocking: Cell::new(None),
			error: RefCell::new(None),
			callback: RefCell::new(None)
		})
	}

	fn complete(&self, error: Option<Error>) {
		*self.error.borrow_mut() = error;

		if let Some(callback) = self.callback.borrow_mut().take() {
			callback();
		}
	}
}

impl ForeignFuture for ForeignStub {
	fn future_blocking(&self) -> Option<bool> {
		self.blocking.get()
	}

	fn set_future_blocking(&self, value: bool) {
		self.blocking.set(Some(value));
	}

	fn event_loop(&self) -> Rc<dyn EventLoop> {
		Rc::clone(&self.event_loop)
	}

	fn add_done_callback(&self, callback: Box<dyn FnOnce()>) {
		*self.callback.borrow_mut() = Some(callback);
	}

	fn cancel(&self) -> bool {
		false
	}

	fn result(&self) -> Result<(), Error> {
		match self.error.borrow().clone() {
			Some(err) => Err(err),
			None => Ok(())
		}
	}

	fn debug_repr(&self) -> String {
		"<ForeignStub>".to_owned()
	}
}

#[test]
fn task_suspends_on_a_foreign_future_compatible_object() {
	let (reactor, event_loop) = reactor();
	let foreign = ForeignStub::new(Rc::clone(&event_loop));
	let foreign_for_task = Rc::clone(&foreign);
	let yielded_once = Rc::new(Cell::new(false));
	let yielded_once_clone = Rc::clone(&yielded_once);

	let task: Task<()> = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(move |exc| {
			if let Some(exc) = exc {
				return Step::Raised(exc);
			}

			if !yielded_once_clone.get() {
				yielded_once_clone.set(true);
				foreign_for_task.set_future_blocking(true);
				return Step::Yielded(Yield::Foreign(Rc::clone(&foreign_for_task)));
			}

			Step::Returned(())
		})
	);

	reactor.run_until_stalled();
	assert!(!task.done(), "task should be suspended on the foreign future");

	foreign.complete(None);
	reactor.run_until_stalled();

	assert!(task.done());
	assert!(task.result().is_ok());
}

#[test]
fn foreign_future_exception_propagates_into_the_task() {
	let (reactor, event_loop) = reactor();
	let foreign = ForeignStub::new(Rc::clone(&event_loop));
	let foreign_for_task = Rc::clone(&foreign);
	let yielded_once = Rc::new(Cell::new(false));
	let yielded_once_clone = Rc::clone(&yielded_once);

	let task: Task<()> = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(move |exc| {
			if let Some(exc) = exc {
				return Step::Raised(exc);
			}

			if !yielded_once_clone.get() {
				yielded_once_clone.set(true);
				foreign_for_task.set_future_blocking(true);
				return Step::Yielded(Yield::Foreign(Rc::clone(&foreign_for_task)));
			}

			Step::Returned(())
		})
	);

	reactor.run_until_stalled();
	foreign.complete(Some(task_engine::Error::type_error("foreign failure")));
	reactor.run_until_stalled();

	let err = task.result().unwrap_err();
	assert_eq!(err.kind(), task_engine::ErrorKind::TypeError);
}

#[test]
fn deferred_cancel_is_injected_once_the_non_cancellable_future_completes() {
	let (reactor, event_loop) = reactor();
	let foreign = ForeignStub::new(Rc::clone(&event_loop));
	let foreign_for_task = Rc::clone(&foreign);
	let yielded_once = Rc::new(Cell::new(false));
	let yielded_once_clone = Rc::clone(&yielded_once);

	let task: Task<()> = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(move |exc| {
			if let Some(exc) = exc {
				return Step::Raised(exc);
			}

			if !yielded_once_clone.get() {
				yielded_once_clone.set(true);
				foreign_for_task.set_future_blocking(true);
				return Step::Yielded(Yield::Foreign(Rc::clone(&foreign_for_task)));
			}

			Step::Returned(())
		})
	);

	reactor.run_until_stalled();
	assert!(!task.done(), "task should be suspended awaiting the non-cancellable future");

	// `ForeignStub::cancel` always refuses (returns `false`), so this lands
	// on the deferred path: `cancel()` still reports success, but nothing
	// about the task's state changes synchronously.
	assert!(task.cancel(), "cancel() reports success even though delivery is deferred");
	assert!(!task.done(), "a refused inner cancel must not finish the task synchronously");
	assert!(!task.cancelled());

	foreign.complete(None);
	reactor.run_until_stalled();

	assert!(task.done());
	assert!(
		task.cancelled(),
		"the deferred cancel is injected as Cancelled on the next step"
	);
}

#[test]
fn current_task_reports_the_task_presently_being_stepped() {
	let (reactor, event_loop) = reactor();
	let observed = Rc::new(Cell::new(false));
	let observed_clone = Rc::clone(&observed);
	let event_loop_inside = Rc::clone(&event_loop);

	assert!(current_task(&event_loop).is_none());

	let task = Task::spawn(
		Rc::clone(&event_loop),
		ComputationFn::new(move |_exc| {
			observed_clone.set(current_task(&event_loop_inside).is_some());
			Step::Returned(())
		})
	);

	reactor.run_until_stalled();

	assert!(observed.get());
	assert!(task.done());
	assert!(current_task(&event_loop).is_none());
}

#[test]
fn all_tasks_reflects_liveness_via_weak_references() {
	let (reactor, event_loop) = reactor();
	let before = all_tasks().len();

	let task: Task<()> =
		Task::spawn(Rc::clone(&event_loop), ComputationFn::new(|_exc| Step::Returned(())));

	assert_eq!(all_tasks().len(), before + 1);

	reactor.run_until_stalled();
	assert!(task.done());
	assert_eq!(
		all_tasks().len(),
		before + 1,
		"a finished task stays in all_tasks as long as it is still referenced"
	);

	drop(task);
	assert_eq!(all_tasks().len(), before);
}
