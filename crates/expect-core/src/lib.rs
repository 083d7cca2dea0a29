//! Core library for running a single test in isolation.
//!
//! This crate provides:
//! - The execution engine (`execute_test`, `Session`)
//! - Signal classification and dispatch (`TestContext`)
//! - Expectation records and their builder
//! - Call-stack capture and source location recovery
//! - The reporter interface plus memory and console reporters
//! - Configuration loading from YAML
//!
//! A test body receives a [`TestContext`] and returns
//! `Result<(), Interrupt>`. Assertions record and continue; skips and errors
//! end the body through `Err`, and panics are caught at the engine boundary.
//!
//! ```
//! use expect_core::{MemoryReporter, execute_test};
//!
//! let mut reporter = MemoryReporter::new();
//! let passed = execute_test(&mut reporter, "addition", |ctx| {
//!     ctx.expect_eq(2 + 2, 4);
//!     ctx.expect(1 < 2, "ordering");
//!     Ok(())
//! });
//! assert!(passed);
//! assert_eq!(reporter.results().count(), 2);
//! ```

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod expectation;
pub mod location;
pub mod reporter;
pub mod signal;
pub mod telemetry;

pub use config::{
    CONFIG_FILE, ConfigError, ConfigOverrides, EngineConfig, apply_overrides, load_config,
    validate_config,
};
pub use dispatch::TestContext;
pub use engine::{Session, execute_test, execute_test_with};
pub use expectation::{Expectation, ExpectationKind, SourceLocation};
pub use location::{CallStack, Frame, resolve};
pub use reporter::{
    ConsoleReporter, MemoryReporter, Reporter, ReporterConfig, ReporterEvent, RunTally,
    TestStatus,
};
pub use signal::{Interrupt, Signal, SignalKind};
pub use telemetry::init_tracing;
