//! Process-wide (thread-local, since the core is single-threaded)
//! bookkeeping of live tasks.
//!
//! Grounded in the source this core was distilled from, which keeps a
//! weak set of every task plus a per-loop "currently running task" stack
//! (`asyncio.all_tasks`/`asyncio.current_task`). Rust has no analogue of a
//! process-wide weak set tied to a GC, so this keeps the same shape with
//! `thread_local!` storage and `Weak` handles instead: tasks unregister
//! themselves implicitly, by simply failing to upgrade, once dropped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::state::{Inner, TaskHandle};
use crate::event_loop::{loop_key, EventLoop};

thread_local! {
	static ALL_TASKS: RefCell<Vec<Weak<dyn TaskHandle>>> = const { RefCell::new(Vec::new()) };
	static CURRENT: RefCell<HashMap<usize, Vec<Weak<dyn TaskHandle>>>> =
		RefCell::new(HashMap::new());
}

/// Register a freshly spawned task with [`ALL_TASKS`].
pub(super) fn register<Output: 'static>(inner: &Rc<Inner<Output>>) {
	let handle: Weak<dyn TaskHandle> = Rc::downgrade(inner);

	ALL_TASKS.with(|tasks| tasks.borrow_mut().push(handle));
}

/// RAII guard pushing a task onto its loop's "currently running" stack for
/// the duration of one `step`, popping it back off on drop.
///
/// Using a guard rather than manual push/pop means the pop still happens
/// if `step` unwinds (a computation panicking), which a plain
/// push-then-pop pair would not guarantee.
pub(super) struct CurrentGuard {
	loop_key: usize
}

impl CurrentGuard {
	pub(super) fn push(event_loop: &Rc<dyn EventLoop>, task: Weak<dyn TaskHandle>) -> Self {
		let key = loop_key(event_loop);

		CURRENT.with(|current| current.borrow_mut().entry(key).or_default().push(task));

		Self { loop_key: key }
	}
}

impl Drop for CurrentGuard {
	fn drop(&mut self) {
		CURRENT.with(|current| {
			if let Some(stack) = current.borrow_mut().get_mut(&self.loop_key) {
				stack.pop();
			}
		});
	}
}

/// The task currently being stepped on `event_loop`, if any.
#[must_use]
pub fn current_task(event_loop: &Rc<dyn EventLoop>) -> Option<Rc<dyn TaskHandle>> {
	let key = loop_key(event_loop);

	CURRENT.with(|current| {
		current
			.borrow()
			.get(&key)
			.and_then(|stack| stack.last())
			.and_then(Weak::upgrade)
	})
}

/// Every task still live, across every loop, pruning weak references that
/// have expired.
#[must_use]
pub fn all_tasks() -> Vec<Rc<dyn TaskHandle>> {
	ALL_TASKS.with(|tasks| {
		let mut tasks = tasks.borrow_mut();

		tasks.retain(|task| task.strong_count() > 0);
		tasks.iter().filter_map(Weak::upgrade).collect()
	})
}

/// Every task still live and bound to `event_loop` specifically.
#[must_use]
pub fn all_tasks_for(event_loop: &Rc<dyn EventLoop>) -> Vec<Rc<dyn TaskHandle>> {
	let key = loop_key(event_loop);

	all_tasks()
		.into_iter()
		.filter(|task| loop_key(&task.event_loop()) == key)
		.collect()
}
