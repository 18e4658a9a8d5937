use crate::error::Error;
use crate::future::AnyFuture;
use std::rc::Rc;

/// What a driven computation's `yield` classified to.
///
/// This is the Rust-native shape of the duck-typed classification table
/// the task driver applies to a resumed computation's yielded value.
pub enum Yield {
	/// A future native to this core.
	Future(Rc<dyn AnyFuture>),

	/// A future-compatible foreign object, classified via the duck-typed
	/// capability set in [`crate::task::ForeignFuture`].
	Foreign(Rc<dyn crate::task::ForeignFuture>),

	/// A bare yield with no payload — relinquish control for one loop
	/// iteration, then resume immediately.
	Empty,

	/// The computation yielded a nested generator instead of delegating to
	/// it (`yield from`/awaiting it).
	Generator(String),

	/// Any other yielded value; not a recognized sentinel. Carries a
	/// `Debug`-style rendering of the value for the resulting error
	/// message.
	Other(String)
}

/// One resumption of a driven computation.
///
/// Models the "exception-as-return" design note: a computation's normal
/// return is `Returned`, distinct in the type system from `Raised` rather
/// than being smuggled through a "stop iteration" exception the way the
/// source this core was distilled from does it.
pub enum Step<Output> {
	Yielded(Yield),
	Returned(Output),
	Raised(Error)
}

/// The suspendable computation a [`crate::task::Task`] drives.
///
/// This is the external collaborator the specification places out of
/// scope: something that can be resumed with an optional injected
/// exception and that reports back what it yielded, returned, or raised.
/// [`crate::task::ComputationFn`] is a ready-made implementation for
/// building computations out of a plain closure.
pub trait Computation {
	type Output;

	/// Resume the computation. `exc` is `Some` when the task is injecting
	/// an exception (including a deferred cancellation) instead of
	/// resuming normally.
	fn resume(&mut self, exc: Option<Error>) -> Step<Self::Output>;
}
