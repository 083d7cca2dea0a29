//! Call-stack capture and source location recovery.
//!
//! Stacks are captured with [`std::backtrace::Backtrace`] and parsed from its
//! rendered form, since the frame API is not stable. Capture is best-effort:
//! when backtraces are unsupported or symbols are stripped the stack is empty
//! or its frames carry no positions, and resolution simply yields `None`.

use crate::expectation::SourceLocation;
use regex::Regex;
use serde::Serialize;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::OnceLock;

/// Path prefixes of frames that belong to the runtime or to this engine.
const MACHINERY_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "__rust",
    "rust_begin_unwind",
    "expect_core::engine::",
    "expect_core::dispatch::",
    "expect_core::location::",
    "expect_core::signal::",
    "expect_core::expectation::",
];

/// One frame of a captured call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Frame {
    /// Create a frame without position metadata.
    #[must_use]
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    /// Attach a file position to the frame.
    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Source position of this frame, if the capture kept one.
    #[must_use]
    pub fn position(&self) -> Option<SourceLocation> {
        let file = self.file.as_ref()?;
        let line = self.line?;
        let column = self.column.unwrap_or(1);
        Some(SourceLocation {
            file: file.clone(),
            start_line: line,
            start_col: column,
            end_line: line,
            end_col: column,
        })
    }

    /// Whether the frame belongs to the runtime or to the engine itself.
    #[must_use]
    pub fn is_machinery(&self) -> bool {
        if self.function == "<unknown>" {
            return true;
        }
        // `<Self as Trait>::f` is user code when either side is.
        match split_qualified(&self.function) {
            Some((self_ty, Some(trait_path))) => {
                is_machinery_path(self_ty) && is_machinery_path(trait_path)
            }
            Some((self_ty, None)) => is_machinery_path(self_ty),
            None => is_machinery_path(&self.function),
        }
    }

    /// Whether the frame is an assertion-style function.
    #[must_use]
    pub fn is_assertion_call(&self) -> bool {
        let Some(re) = assertion_name_regex() else {
            return false;
        };
        re.is_match(last_segment(&self.function))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.function)?;
        if let (Some(file), Some(line)) = (&self.file, self.line) {
            write!(f, " at {file}:{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// A call stack, most recent frame first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    #[must_use]
    pub const fn from_frames(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Capture the active call stack of the current thread.
    #[inline(never)]
    #[must_use]
    pub fn capture() -> Self {
        let backtrace = Backtrace::force_capture();
        if backtrace.status() != BacktraceStatus::Captured {
            return Self::default();
        }
        Self::parse(&backtrace.to_string())
    }

    /// Parse the rendered form of a [`Backtrace`].
    ///
    /// Unrecognized lines are ignored, so arbitrary text yields an empty stack.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let (Some(symbol_re), Some(position_re)) = (symbol_line_regex(), position_line_regex())
        else {
            return Self::default();
        };

        let mut frames: Vec<Frame> = Vec::new();
        for line in text.lines() {
            if let Some(cap) = position_re.captures(line) {
                let Some(frame) = frames.last_mut().filter(|f| f.file.is_none()) else {
                    continue;
                };
                frame.file = cap.get(1).map(|m| m.as_str().to_string());
                frame.line = cap.get(2).and_then(|m| m.as_str().parse().ok());
                frame.column = cap.get(3).and_then(|m| m.as_str().parse().ok());
            } else if let Some(cap) = symbol_re.captures(line) {
                let function = cap.get(1).map_or("", |m| m.as_str());
                frames.push(Frame::new(function));
            }
        }
        Self { frames }
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames from the capturing caller down to the thread root.
    ///
    /// Leading frames of the capture itself are not counted, so a stack
    /// captured inside a function reports that function's depth.
    #[must_use]
    pub fn base_depth(&self) -> usize {
        let capture_frames = self
            .frames
            .iter()
            .take_while(|f| is_capture_frame(&f.function))
            .count();
        self.frames.len() - capture_frames
    }

    /// Drop the `base_depth` oldest frames, then strip machinery frames from
    /// both ends of what remains.
    #[must_use]
    pub fn trim(&self, base_depth: usize) -> Self {
        let keep = self.frames.len().saturating_sub(base_depth);
        let frames = &self.frames[..keep];
        let Some(start) = frames.iter().position(|f| !f.is_machinery()) else {
            return Self::default();
        };
        let end = frames
            .iter()
            .rposition(|f| !f.is_machinery())
            .map_or(start, |i| i + 1);
        Self {
            frames: frames[start..end].to_vec(),
        }
    }

    /// Keep at most `max` of the most recent frames.
    pub fn truncate(&mut self, max: usize) {
        self.frames.truncate(max);
    }

    #[must_use]
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

impl fmt::Display for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, frame) in self.frames.iter().enumerate() {
            writeln!(f, "{index:4}: {frame}")?;
        }
        Ok(())
    }
}

/// Recover the call site of the assertion that produced a signal.
///
/// Scans from the most recent frame and returns the position of the first
/// frame that is outside the engine, whose callee is an assertion-style
/// function, and which carries a file position.
#[must_use]
pub fn resolve(stack: &CallStack) -> Option<SourceLocation> {
    stack
        .frames
        .windows(2)
        .find_map(|pair| match pair {
            [callee, caller]
                if callee.is_assertion_call() && !caller.is_machinery() =>
            {
                caller.position()
            }
            _ => None,
        })
}

fn is_machinery_path(path: &str) -> bool {
    let mut path = path;
    loop {
        let next = path.trim_start_matches(['<', '&', '*', '[', '(', ' ']);
        let next = next
            .strip_prefix("mut ")
            .or_else(|| next.strip_prefix("const "))
            .unwrap_or(next);
        if next.len() == path.len() {
            break;
        }
        path = next;
    }
    MACHINERY_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// Split `<Self as Trait>::rest` into the self type and the trait path.
fn split_qualified(function: &str) -> Option<(&str, Option<&str>)> {
    let inner = function.strip_prefix('<')?;
    let mut depth = 0usize;
    let mut as_at = None;
    let mut prev = '<';
    for (index, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            // `->` in fn pointer types
            '>' if prev == '-' => {}
            '>' if depth == 0 => {
                let self_ty = &inner[..as_at.unwrap_or(index)];
                let trait_path = as_at.map(|at| &inner[at + " as ".len()..index]);
                return Some((self_ty, trait_path));
            }
            '>' => depth -= 1,
            ' ' if depth == 0 && as_at.is_none() && inner[index..].starts_with(" as ") => {
                as_at = Some(index);
            }
            _ => {}
        }
        prev = c;
    }
    None
}

fn is_capture_frame(function: &str) -> bool {
    function.starts_with("std::backtrace")
        || function.starts_with("expect_core::location::")
        || function.starts_with("expect_core::signal::")
        || function.starts_with("<expect_core::signal::")
}

/// Last path segment of a symbol name, without closures or generic arguments.
fn last_segment(function: &str) -> &str {
    let mut path = function;
    while let Some(stripped) = path.strip_suffix("::{{closure}}") {
        path = stripped;
    }
    let segment = path.rsplit("::").next().unwrap_or(path);
    segment.split('<').next().unwrap_or(segment)
}

fn assertion_name_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(expect|assert|check|verify|skip|fail)(_\w*)?$").ok())
        .as_ref()
}

/// Symbol lines: `  12: path::to::fn`, or indented inlined symbols.
fn symbol_line_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\s*\d+:|\s{6})\s*(\S.*?)\s*$").ok())
        .as_ref()
}

/// Position lines: `at ./src/lib.rs:10:5`.
fn position_line_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+at\s+(.+?):(\d+)(?::(\d+))?\s*$").ok())
        .as_ref()
}
