//! Signals raised by test bodies and the interrupts that abort them.
//!
//! Continuation and abort are split across two types. A [`Signal`] is handed
//! to [`TestContext::raise`](crate::TestContext::raise), which returns
//! `Ok(())` when the body may keep running. An [`Interrupt`] travels the other
//! way, as the `Err` of a test body, and ends it.

use crate::dispatch;
use crate::expectation::SourceLocation;
use crate::location::CallStack;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;

/// A structured event raised during body execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Outcome of one assertion. Execution continues after it.
    ExpectationResult {
        passed: bool,
        message: Option<String>,
        location: Option<SourceLocation>,
    },
    /// Abort the rest of the body without failing the test.
    Skip {
        reason: String,
        location: Option<SourceLocation>,
    },
    /// Informational text. Never recorded.
    DiagnosticMessage { text: String },
    /// Anything not produced by an assertion. Fails the test and aborts it.
    Error {
        payload: String,
        raw_stack: CallStack,
        origin: Option<SourceLocation>,
    },
}

/// Discriminant of a [`Signal`], in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalKind {
    Expectation,
    Skip,
    Diagnostic,
    Error,
}

impl Signal {
    /// An assertion outcome without a location; the dispatcher resolves one
    /// from the call stack.
    #[must_use]
    pub const fn expectation(passed: bool, message: Option<String>) -> Self {
        Self::ExpectationResult {
            passed,
            message,
            location: None,
        }
    }

    #[track_caller]
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip {
            reason: reason.into(),
            location: Some(Location::caller().into()),
        }
    }

    #[must_use]
    pub fn diagnostic(text: impl Into<String>) -> Self {
        Self::DiagnosticMessage { text: text.into() }
    }

    /// An error raised at the caller, with the current call stack attached.
    #[track_caller]
    #[must_use]
    pub fn error(payload: impl Into<String>) -> Self {
        Self::Error {
            payload: payload.into(),
            raw_stack: dispatch::error_stack(),
            origin: Some(Location::caller().into()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> SignalKind {
        match self {
            Self::ExpectationResult { .. } => SignalKind::Expectation,
            Self::Skip { .. } => SignalKind::Skip,
            Self::DiagnosticMessage { .. } => SignalKind::Diagnostic,
            Self::Error { .. } => SignalKind::Error,
        }
    }

    /// Whether the body must stop after this signal.
    #[must_use]
    pub const fn aborts(&self) -> bool {
        matches!(self.kind(), SignalKind::Skip | SignalKind::Error)
    }
}

#[derive(Debug)]
enum Cause {
    Skip {
        reason: String,
        location: Option<SourceLocation>,
    },
    Error {
        message: String,
        stack: CallStack,
        origin: Option<SourceLocation>,
    },
}

/// Early exit from a test body.
///
/// Bodies return `Result<(), Interrupt>`, so `?` works on any fallible call:
/// every `std::error::Error` converts into an error interrupt that captures
/// the call stack at the `?`. This type intentionally does not implement
/// `std::error::Error` itself, which keeps that blanket conversion coherent.
#[derive(Debug)]
pub struct Interrupt {
    cause: Cause,
    reported: bool,
}

impl Interrupt {
    #[track_caller]
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::from_signal(Signal::skip(reason))
    }

    #[track_caller]
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::from_signal(Signal::error(message))
    }

    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self.cause, Cause::Skip { .. })
    }

    /// Skip reason or error message.
    #[must_use]
    pub fn message(&self) -> &str {
        match &self.cause {
            Cause::Skip { reason, .. } => reason,
            Cause::Error { message, .. } => message,
        }
    }

    /// Whether the dispatcher already forwarded this interrupt's record.
    #[must_use]
    pub const fn is_reported(&self) -> bool {
        self.reported
    }

    pub(crate) fn from_signal(signal: Signal) -> Self {
        let cause = match signal {
            Signal::Skip { reason, location } => Cause::Skip { reason, location },
            Signal::Error {
                payload,
                raw_stack,
                origin,
            } => Cause::Error {
                message: payload,
                stack: raw_stack,
                origin,
            },
            Signal::ExpectationResult { message, .. } => Cause::Error {
                message: message.unwrap_or_default(),
                stack: CallStack::default(),
                origin: None,
            },
            Signal::DiagnosticMessage { text } => Cause::Error {
                message: text,
                stack: CallStack::default(),
                origin: None,
            },
        };
        Self {
            cause,
            reported: false,
        }
    }

    pub(crate) const fn into_reported(mut self) -> Self {
        self.reported = true;
        self
    }

    pub(crate) fn into_signal(self) -> Signal {
        match self.cause {
            Cause::Skip { reason, location } => Signal::Skip { reason, location },
            Cause::Error {
                message,
                stack,
                origin,
            } => Signal::Error {
                payload: message,
                raw_stack: stack,
                origin,
            },
        }
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Cause::Skip { reason, .. } => write!(f, "skipped: {reason}"),
            Cause::Error { message, .. } => write!(f, "{message}"),
        }
    }
}

impl<E> From<E> for Interrupt
where
    E: StdError + Send + Sync + 'static,
{
    #[track_caller]
    fn from(error: E) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::from_signal(Signal::Error {
            payload: message,
            raw_stack: dispatch::error_stack(),
            origin: Some(Location::caller().into()),
        })
    }
}
