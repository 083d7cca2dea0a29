//! Test execution engine.

use crate::config::EngineConfig;
use crate::dispatch::{self, TestContext};
use crate::expectation::{Expectation, ExpectationKind};
use crate::location::CallStack;
use crate::reporter::{Reporter, RunTally, TestStatus};
use crate::signal::Interrupt;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Run one test body with the default configuration.
///
/// See [`execute_test_with`].
pub fn execute_test<F>(reporter: &mut dyn Reporter, description: &str, body: F) -> bool
where
    F: FnOnce(&mut TestContext<'_>) -> Result<(), Interrupt>,
{
    execute_test_with(&EngineConfig::default(), reporter, description, body)
}

/// Run one test body and return whether every recorded expectation passed.
///
/// The reporter sees exactly one `start_test`, one `add_result` per recorded
/// expectation, and one `end_test`, whatever the body does. The body is
/// called once; bindings it creates stay inside its closure. Skips, errors
/// returned with `?` and panics all end the body early and are recorded;
/// none of them escape this function.
pub fn execute_test_with<F>(
    config: &EngineConfig,
    reporter: &mut dyn Reporter,
    description: &str,
    body: F,
) -> bool
where
    F: FnOnce(&mut TestContext<'_>) -> Result<(), Interrupt>,
{
    debug!(test = description, "test started");
    let mut ctx = TestContext::open(reporter, description, config);

    let result = {
        let _dispatch = dispatch::install(config.capture_stack);
        invoke_body(&mut ctx, body)
    };
    match result {
        Ok(Ok(())) => {}
        Ok(Err(interrupt)) => {
            debug!(test = description, %interrupt, "test body interrupted");
            ctx.absorb(interrupt);
        }
        Err(payload) => {
            debug!(test = description, "test body panicked");
            ctx.absorb_panic(payload.as_ref());
        }
    }

    let passed = ctx.outcome();
    drop(ctx);
    debug!(test = description, passed, "test finished");
    passed
}

/// Entry frame of every test body. Stack depth is measured here so error
/// stacks can be cut at the body boundary.
#[inline(never)]
fn invoke_body<F>(ctx: &mut TestContext<'_>, body: F) -> std::thread::Result<Result<(), Interrupt>>
where
    F: FnOnce(&mut TestContext<'_>) -> Result<(), Interrupt>,
{
    if ctx.capture_stack() {
        ctx.set_base_depth(CallStack::capture().base_depth());
    }
    panic::catch_unwind(AssertUnwindSafe(|| body(ctx)))
}

/// Forwards to the session reporter while tracking the test's status.
struct StatusObserver<'a> {
    inner: &'a mut dyn Reporter,
    status: TestStatus,
}

impl Reporter for StatusObserver<'_> {
    fn start_test(&mut self, description: &str) {
        self.status = TestStatus::Passed;
        self.inner.start_test(description);
    }

    fn add_result(&mut self, expectation: Expectation) {
        match expectation.kind {
            ExpectationKind::Fail => self.status = TestStatus::Failed,
            ExpectationKind::Skip if self.status == TestStatus::Passed => {
                self.status = TestStatus::Skipped;
            }
            _ => {}
        }
        self.inner.add_result(expectation);
    }

    fn end_test(&mut self) {
        self.inner.end_test();
    }
}

/// One test run: the reporter and configuration threaded through every
/// test executed in it.
pub struct Session<R: Reporter> {
    reporter: R,
    config: EngineConfig,
    tally: RunTally,
}

impl<R: Reporter> Session<R> {
    #[must_use]
    pub fn new(reporter: R) -> Self {
        Self::with_config(reporter, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(reporter: R, config: EngineConfig) -> Self {
        Self {
            reporter,
            config,
            tally: RunTally::default(),
        }
    }

    #[must_use]
    pub const fn reporter(&self) -> &R {
        &self.reporter
    }

    pub const fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    /// Replace the reporter, returning the previous one.
    pub fn set_reporter(&mut self, reporter: R) -> R {
        std::mem::replace(&mut self.reporter, reporter)
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Passed, failed and skipped counts for the tests run so far.
    #[must_use]
    pub const fn tally(&self) -> RunTally {
        self.tally
    }

    /// Run one test through this session's reporter.
    pub fn test<F>(&mut self, description: &str, body: F) -> bool
    where
        F: FnOnce(&mut TestContext<'_>) -> Result<(), Interrupt>,
    {
        let mut observer = StatusObserver {
            inner: &mut self.reporter,
            status: TestStatus::Passed,
        };
        let passed = execute_test_with(&self.config, &mut observer, description, body);
        self.tally.record(observer.status);
        passed
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }
}
