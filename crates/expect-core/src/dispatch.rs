//! Signal classification and dispatch.
//!
//! A [`TestContext`] exists for exactly one test. Opening it sends
//! `start_test` to the reporter and dropping it sends `end_test`, so the pair
//! is balanced on every exit path. While a body runs, a thread-scoped panic
//! hook is installed that records where a panic happened instead of printing
//! it.

use crate::config::EngineConfig;
use crate::expectation::{self, Expectation, SourceLocation};
use crate::location::CallStack;
use crate::reporter::Reporter;
use crate::signal::{Interrupt, Signal};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::panic::{self, Location, PanicHookInfo};
use std::sync::Once;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Inactive,
    Active { capture_stack: bool },
}

/// What the panic hook saw at the panic site.
#[derive(Debug, Default)]
struct PanicCapture {
    stack: CallStack,
    origin: Option<SourceLocation>,
}

thread_local! {
    static STATE: Cell<DispatchState> = const { Cell::new(DispatchState::Inactive) };
    static LAST_PANIC: RefCell<Option<PanicCapture>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Scoped installation of the dispatch layer on the current thread.
///
/// Restores the previous state on drop, including during unwinding.
pub(crate) struct DispatchGuard {
    previous: DispatchState,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        STATE.with(|state| state.set(self.previous));
    }
}

/// Install dispatch for the duration of one body.
pub(crate) fn install(capture_stack: bool) -> DispatchGuard {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if STATE.with(Cell::get) == DispatchState::Inactive {
                previous(info);
            } else {
                record_panic(info);
            }
        }));
    });
    let previous = STATE.with(|state| state.replace(DispatchState::Active { capture_stack }));
    LAST_PANIC.with(|slot| *slot.borrow_mut() = None);
    DispatchGuard { previous }
}

fn record_panic(info: &PanicHookInfo<'_>) {
    let capture = PanicCapture {
        stack: error_stack(),
        origin: info.location().map(SourceLocation::from),
    };
    trace!(origin = ?capture.origin, "panic intercepted in test body");
    LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(capture));
}

/// Call stack for a new error signal, honouring the active capture setting.
pub(crate) fn error_stack() -> CallStack {
    match STATE.with(Cell::get) {
        DispatchState::Active {
            capture_stack: false,
        } => CallStack::default(),
        _ => CallStack::capture(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test body panicked with a non-string payload".to_string()
    }
}

/// Per-test dispatch state, handed to the test body.
///
/// Assertion helpers report through [`raise`](Self::raise) or the
/// `#[track_caller]` shorthands, which capture the call site at compile
/// time.
pub struct TestContext<'r> {
    reporter: &'r mut dyn Reporter,
    description: String,
    passed: bool,
    recorded: usize,
    aborted: bool,
    base_depth: usize,
    capture_stack: bool,
    max_stack_frames: usize,
}

impl<'r> TestContext<'r> {
    pub(crate) fn open(
        reporter: &'r mut dyn Reporter,
        description: &str,
        config: &EngineConfig,
    ) -> Self {
        reporter.start_test(description);
        Self {
            reporter,
            description: description.to_string(),
            passed: true,
            recorded: 0,
            aborted: false,
            base_depth: 0,
            capture_stack: config.capture_stack,
            max_stack_frames: config.max_stack_frames,
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Logical AND over every recorded expectation so far.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.passed
    }

    /// Number of expectations forwarded to the reporter so far.
    #[must_use]
    pub const fn recorded(&self) -> usize {
        self.recorded
    }

    /// Whether a skip or error has already ended this test.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Classify and handle one signal.
    ///
    /// Expectation results are recorded and diagnostics dropped; both return
    /// `Ok(())` so the body continues at the next statement. Skips and errors
    /// are recorded and returned as `Err`, which the body propagates with `?`.
    /// Once the test is aborted nothing else is recorded.
    ///
    /// # Errors
    /// Returns the [`Interrupt`] that ends the body for skip and error
    /// signals, and for any signal raised after an abort.
    pub fn raise(&mut self, signal: Signal) -> Result<(), Interrupt> {
        trace!(test = %self.description, kind = ?signal.kind(), "signal raised");
        if self.aborted {
            return Err(Interrupt::from_signal(signal).into_reported());
        }
        match signal {
            Signal::DiagnosticMessage { text } => {
                trace!(test = %self.description, %text, "diagnostic discarded");
                Ok(())
            }
            signal @ Signal::ExpectationResult { .. } => {
                self.record(signal);
                Ok(())
            }
            signal @ (Signal::Skip { .. } | Signal::Error { .. }) => {
                let interrupt = Interrupt::from_signal(signal.clone()).into_reported();
                self.record(signal);
                self.aborted = true;
                Err(interrupt)
            }
        }
    }

    /// Record an assertion outcome at the caller's location and continue.
    ///
    /// Returns `passed` so callers can branch on it.
    #[track_caller]
    pub fn expect(&mut self, passed: bool, message: impl Into<String>) -> bool {
        let signal = Signal::ExpectationResult {
            passed,
            message: Some(message.into()),
            location: Some(Location::caller().into()),
        };
        // Only an already aborted test returns Err here; nothing to propagate.
        let _ = self.raise(signal);
        passed
    }

    /// Record whether `left == right` at the caller's location.
    #[track_caller]
    pub fn expect_eq<T>(&mut self, left: T, right: T) -> bool
    where
        T: PartialEq + Debug,
    {
        let passed = left == right;
        let message = if passed {
            format!("{left:?} == {right:?}")
        } else {
            format!("expected {right:?}, got {left:?}")
        };
        self.expect(passed, message)
    }

    /// Record a skip at the caller's location and return the interrupt that
    /// ends the body: `return Err(ctx.skip("reason"))`.
    #[track_caller]
    pub fn skip(&mut self, reason: impl Into<String>) -> Interrupt {
        let signal = Signal::skip(reason);
        self.raise(signal.clone())
            .err()
            .unwrap_or_else(|| Interrupt::from_signal(signal).into_reported())
    }

    /// Emit a diagnostic message. It is never recorded.
    pub fn note(&mut self, text: impl Into<String>) {
        let _ = self.raise(Signal::diagnostic(text));
    }

    pub(crate) const fn set_base_depth(&mut self, depth: usize) {
        self.base_depth = depth;
    }

    pub(crate) const fn capture_stack(&self) -> bool {
        self.capture_stack
    }

    /// Record an interrupt that reached the engine boundary, unless the
    /// dispatcher already did when it was raised.
    pub(crate) fn absorb(&mut self, interrupt: Interrupt) {
        if interrupt.is_reported() || self.aborted {
            return;
        }
        self.record(interrupt.into_signal());
        self.aborted = true;
    }

    /// Record a panic that escaped the body as an error.
    pub(crate) fn absorb_panic(&mut self, payload: &(dyn Any + Send)) {
        let capture = LAST_PANIC
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_default();
        if self.aborted {
            return;
        }
        self.record(Signal::Error {
            payload: panic_message(payload),
            raw_stack: capture.stack,
            origin: capture.origin,
        });
        self.aborted = true;
    }

    pub(crate) const fn outcome(&self) -> bool {
        self.passed
    }

    fn record(&mut self, signal: Signal) {
        let stack = match &signal {
            Signal::ExpectationResult { location: None, .. } if self.capture_stack => {
                CallStack::capture()
            }
            _ => CallStack::default(),
        };
        let Some(mut record) = expectation::build(signal, &stack, self.base_depth) else {
            return;
        };
        record.stack.truncate(self.max_stack_frames);
        if !record.passed && record.location.is_none() {
            warn!(test = %self.description, "no source location for failing expectation");
        }
        self.forward(record);
    }

    fn forward(&mut self, record: Expectation) {
        trace!(test = %self.description, kind = %record.kind, "expectation recorded");
        self.passed &= record.passed;
        self.recorded += 1;
        self.reporter.add_result(record);
    }
}

impl Drop for TestContext<'_> {
    fn drop(&mut self) {
        self.reporter.end_test();
    }
}
