use std::any::Any;
use thiserror::Error;

/// The reason a [`Handle`](crate::task::Handle) settled without a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The producing closure panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The producer went away without ever settling its slot.
    #[error("task handle broken: producer dropped without settling")]
    Broken,
}

/// Unwind payload raised by [`Handle::join`](crate::task::Handle::join) when
/// the joined handle failed.
/// Nothing outside the crate can raise it.
pub(crate) struct Forwarded(pub TaskError);

impl TaskError {
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken)
    }

    /// Converts a caught unwind payload into a `TaskError`.
    ///
    /// Failures forwarded by [`Handle::join`](crate::task::Handle::join)
    /// are returned untouched so the failure kind survives a chain. Any other
    /// payload, including a `TaskError` a closure panicked with by hand, is a
    /// task failure.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<Forwarded>() {
            Ok(forwarded) => return forwarded.0,
            Err(payload) => payload,
        };

        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_owned(),
                Err(payload) => match payload.downcast::<TaskError>() {
                    Ok(error) => error.to_string(),
                    Err(_) => String::from("Box<dyn Any>"),
                },
            },
        };

        Self::Panicked(message)
    }
}
