//! The error taxonomy produced by [`crate::future`] and [`crate::task`].
//!
//! Unlike a typical `std::io::Error`-style error, every variant here is
//! cheap to [`Clone`]: the same stored exception may be handed back to
//! [`crate::future::Future::result`] on every call, and again to the
//! diagnostics sink (see [`crate::diagnostics`]) if it is never observed.
//! User exceptions are therefore kept behind an [`Rc`] rather than owned
//! outright.

use std::error;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;
use std::result;

pub type Result<T> = result::Result<T, Error>;

/// A coarse classification of [`Error`], mirroring the taxonomy in the
/// error handling design: invalid state transitions, cancellation,
/// protocol violations committed by a driven computation, and errors
/// supplied by user code.
#[non_exhaustive]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
	InvalidState,
	Cancelled,
	TypeError,
	Protocol,
	User
}

impl Display for ErrorKind {
	fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
		let message = match self {
			Self::InvalidState => "invalid state",
			Self::Cancelled => "cancelled",
			Self::TypeError => "type error",
			Self::Protocol => "protocol violation",
			Self::User => "user exception"
		};

		fmt.write_str(message)
	}
}

#[derive(Clone)]
enum Repr {
	/// A `set_result`/`set_exception`/`cancel` call landed on a future
	/// that was not `Pending`, or a task was stepped while not `Pending`.
	InvalidState(&'static str),

	/// The future or task was cancelled.
	Cancelled,

	/// A value handed to `set_exception` (or a foreign future's result)
	/// could not be accepted as an exception.
	TypeError(String),

	/// The driven computation committed a protocol violation. The message
	/// is fully formatted at the call site (it needs the task's and the
	/// offending value's `Debug` representations), mirroring the literal
	/// wording of the system this core was distilled from.
	Protocol(String),

	/// An exception raised by user code and threaded through
	/// `set_exception` or a computation's `throw`.
	User(Rc<dyn error::Error>)
}

/// An error produced by this crate's future/task core.
///
/// `Error` is intentionally flat rather than a `std::io::Error`-style
/// wrapper over arbitrary causes: the taxonomy it carries is closed and
/// small, and every call site that needs to distinguish cases matches on
/// [`Error::kind`] rather than downcasting.
#[derive(Clone)]
pub struct Error(Repr);

impl Error {
	#[must_use]
	pub fn invalid_state(context: &'static str) -> Self {
		Self(Repr::InvalidState(context))
	}

	#[must_use]
	pub fn cancelled() -> Self {
		Self(Repr::Cancelled)
	}

	#[must_use]
	pub fn type_error(message: impl Into<String>) -> Self {
		Self(Repr::TypeError(message.into()))
	}

	pub(crate) fn protocol(message: String) -> Self {
		Self(Repr::Protocol(message))
	}

	#[must_use]
	pub fn user<E>(err: E) -> Self
	where
		E: error::Error + 'static
	{
		Self(Repr::User(Rc::new(err)))
	}

	#[must_use]
	pub fn kind(&self) -> ErrorKind {
		match &self.0 {
			Repr::InvalidState(_) => ErrorKind::InvalidState,
			Repr::Cancelled => ErrorKind::Cancelled,
			Repr::TypeError(_) => ErrorKind::TypeError,
			Repr::Protocol(_) => ErrorKind::Protocol,
			Repr::User(_) => ErrorKind::User
		}
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		matches!(self.0, Repr::Cancelled)
	}
}

impl Display for Error {
	fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
		match &self.0 {
			Repr::InvalidState(context) => write!(fmt, "invalid state: {context}"),
			Repr::Cancelled => fmt.write_str("operation cancelled"),
			Repr::TypeError(message) | Repr::Protocol(message) => fmt.write_str(message),
			Repr::User(cause) => Display::fmt(cause, fmt)
		}
	}
}

impl Debug for Error {
	fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
		fmt.debug_struct("Error")
			.field("kind", &self.kind())
			.field("message", &self.to_string())
			.finish()
	}
}

impl error::Error for Error {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match &self.0 {
			Repr::User(cause) => Some(cause.as_ref()),
			_ => None
		}
	}
}
