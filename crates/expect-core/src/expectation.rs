//! Normalized expectation records.

use crate::location::{CallStack, Frame, resolve};
use crate::signal::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// File plus line/column span of an assertion call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            start_line: location.line(),
            start_col: location.column(),
            end_line: location.line(),
            end_col: location.column(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.start_line, self.start_col)
    }
}

/// Kind of a recorded expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectationKind {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for ExpectationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// The normalized outcome of one assertion, skip, or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expectation {
    pub passed: bool,
    pub kind: ExpectationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Trimmed call stack; only populated for errors.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<Frame>,
}

impl Expectation {
    #[must_use]
    pub fn is_skip(&self) -> bool {
        self.kind == ExpectationKind::Skip
    }
}

/// Build an expectation record from a raised signal.
///
/// `stack` is the call stack at the time of the signal. It is consulted only
/// when the signal does not already carry a location; for errors it is
/// ignored in favour of the stack the error captured itself, which is
/// trimmed with `base_depth`. Diagnostic messages produce no record.
#[must_use]
pub fn build(signal: Signal, stack: &CallStack, base_depth: usize) -> Option<Expectation> {
    match signal {
        Signal::ExpectationResult {
            passed,
            message,
            location,
        } => Some(Expectation {
            passed,
            kind: if passed {
                ExpectationKind::Pass
            } else {
                ExpectationKind::Fail
            },
            message,
            location: location.or_else(|| resolve(stack)),
            stack: Vec::new(),
        }),
        Signal::Skip { reason, location } => Some(Expectation {
            passed: true,
            kind: ExpectationKind::Skip,
            message: Some(reason),
            location,
            stack: Vec::new(),
        }),
        Signal::DiagnosticMessage { .. } => None,
        Signal::Error {
            payload,
            raw_stack,
            origin,
        } => {
            let trimmed = raw_stack.trim(base_depth);
            Some(Expectation {
                passed: false,
                kind: ExpectationKind::Fail,
                message: Some(payload),
                location: resolve(&trimmed).or(origin),
                stack: trimmed.into_frames(),
            })
        }
    }
}
