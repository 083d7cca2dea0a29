//! Reporter interface and the bundled sinks.

use crate::expectation::{Expectation, ExpectationKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::time::Instant;
use tracing::warn;

/// Receives the per-test event stream: one `start_test`, any number of
/// `add_result`, one `end_test`.
pub trait Reporter {
    fn start_test(&mut self, description: &str);
    fn add_result(&mut self, expectation: Expectation);
    fn end_test(&mut self);
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn start_test(&mut self, description: &str) {
        (**self).start_test(description);
    }

    fn add_result(&mut self, expectation: Expectation) {
        (**self).add_result(expectation);
    }

    fn end_test(&mut self) {
        (**self).end_test();
    }
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn start_test(&mut self, description: &str) {
        (**self).start_test(description);
    }

    fn add_result(&mut self, expectation: Expectation) {
        (**self).add_result(expectation);
    }

    fn end_test(&mut self) {
        (**self).end_test();
    }
}

/// One event received by a [`MemoryReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterEvent {
    StartTest(String),
    AddResult(Expectation),
    EndTest,
}

/// Reporter that keeps the raw event stream in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    events: Vec<ReporterEvent>,
}

impl MemoryReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[ReporterEvent] {
        &self.events
    }

    /// Expectations received so far, in order.
    pub fn results(&self) -> impl Iterator<Item = &Expectation> {
        self.events.iter().filter_map(|event| match event {
            ReporterEvent::AddResult(expectation) => Some(expectation),
            _ => None,
        })
    }

    /// Drain the recorded events.
    pub fn take_events(&mut self) -> Vec<ReporterEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Reporter for MemoryReporter {
    fn start_test(&mut self, description: &str) {
        self.events
            .push(ReporterEvent::StartTest(description.to_string()));
    }

    fn add_result(&mut self, expectation: Expectation) {
        self.events.push(ReporterEvent::AddResult(expectation));
    }

    fn end_test(&mut self) {
        self.events.push(ReporterEvent::EndTest);
    }
}

/// Status of a finished test, for run-level counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    /// Any failure fails the test; otherwise any skip marks it skipped.
    #[must_use]
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a Expectation>) -> Self {
        let mut status = Self::Passed;
        for result in results {
            match result.kind {
                ExpectationKind::Fail => return Self::Failed,
                ExpectationKind::Skip => status = Self::Skipped,
                ExpectationKind::Pass => {}
            }
        }
        status
    }
}

/// Per-run counts of test statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTally {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunTally {
    pub const fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

/// Reporter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReporterConfig {
    /// Show every expectation, not just failures.
    #[serde(default)]
    pub verbose: bool,
    /// Use colors in output.
    #[serde(default = "default_color")]
    pub color: bool,
}

const fn default_color() -> bool {
    true
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            color: true,
        }
    }
}

const GREEN: &str = "32";
const RED: &str = "31";
const YELLOW: &str = "33";

/// Reporter with cargo test-like output.
pub struct ConsoleReporter<W: Write = io::Stdout> {
    config: ReporterConfig,
    out: W,
    current: Option<String>,
    results: Vec<Expectation>,
    failures: Vec<(String, Vec<Expectation>)>,
    tally: RunTally,
    started: Instant,
    write_error: Option<io::Error>,
}

impl ConsoleReporter<io::Stdout> {
    /// Create a reporter writing to stdout.
    #[must_use]
    pub fn stdout(config: ReporterConfig) -> Self {
        Self::new(config, io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    #[must_use]
    pub fn new(config: ReporterConfig, out: W) -> Self {
        Self {
            config,
            out,
            current: None,
            results: Vec::new(),
            failures: Vec::new(),
            tally: RunTally::default(),
            started: Instant::now(),
            write_error: None,
        }
    }

    #[must_use]
    pub const fn tally(&self) -> RunTally {
        self.tally
    }

    /// Print the failures section and the final summary line.
    ///
    /// # Errors
    ///
    /// Returns the first write error hit during the run. Output stops at
    /// that error, but the tally still covers every test.
    pub fn finish(&mut self) -> io::Result<RunTally> {
        let failures = std::mem::take(&mut self.failures);
        if !failures.is_empty() {
            self.line(format_args!(""));
            self.line(format_args!("failures:"));
            self.line(format_args!(""));
            for (description, failed) in &failures {
                self.line(format_args!("---- {description} ----"));
                for record in failed {
                    let message = record.message.as_deref().unwrap_or("expectation failed");
                    match &record.location {
                        Some(location) => self.line(format_args!("    {message} ({location})")),
                        None => self.line(format_args!("    {message}")),
                    }
                    for frame in &record.stack {
                        self.line(format_args!("        at {frame}"));
                    }
                }
                self.line(format_args!(""));
            }
        }

        let status = if self.tally.failed == 0 {
            self.paint("ok", GREEN)
        } else {
            self.paint("FAILED", RED)
        };
        let tally = self.tally;
        let elapsed = self.started.elapsed().as_secs_f64();
        self.line(format_args!(""));
        self.line(format_args!(
            "test result: {status}. {} passed; {} failed; {} skipped; finished in {elapsed:.1}s",
            tally.passed, tally.failed, tally.skipped
        ));
        self.flush();

        match self.write_error.take() {
            Some(err) => Err(err),
            None => Ok(tally),
        }
    }

    /// First write error, if output has stopped.
    #[must_use]
    pub const fn write_error(&self) -> Option<&io::Error> {
        self.write_error.as_ref()
    }

    /// Consume the reporter and return its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.config.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if self.write_error.is_some() {
            return;
        }
        let mut text = args.to_string();
        text.push('\n');
        if let Err(err) = self.out.write_all(text.as_bytes()) {
            warn!(error = %err, "console output stopped");
            self.write_error = Some(err);
        }
    }

    fn flush(&mut self) {
        if self.write_error.is_some() {
            return;
        }
        if let Err(err) = self.out.flush() {
            warn!(error = %err, "console output stopped");
            self.write_error = Some(err);
        }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn start_test(&mut self, description: &str) {
        self.current = Some(description.to_string());
        self.results.clear();
    }

    fn add_result(&mut self, expectation: Expectation) {
        if self.config.verbose {
            let marker = match expectation.kind {
                ExpectationKind::Pass => self.paint("ok", GREEN),
                ExpectationKind::Fail => self.paint("FAILED", RED),
                ExpectationKind::Skip => self.paint("skip", YELLOW),
            };
            let message = expectation.message.as_deref().unwrap_or("");
            self.line(format_args!("    {marker} {message}"));
        }
        self.results.push(expectation);
    }

    fn end_test(&mut self) {
        let description = self.current.take().unwrap_or_default();
        let status = TestStatus::from_results(&self.results);
        self.tally.record(status);

        let label = match status {
            TestStatus::Passed => self.paint("ok", GREEN),
            TestStatus::Failed => self.paint("FAILED", RED),
            TestStatus::Skipped => self.paint("skipped", YELLOW),
        };
        self.line(format_args!("test {description} ... {label}"));
        self.flush();

        if status == TestStatus::Failed {
            let failed = self
                .results
                .drain(..)
                .filter(|r| r.kind == ExpectationKind::Fail)
                .collect();
            self.failures.push((description, failed));
        }
    }
}
