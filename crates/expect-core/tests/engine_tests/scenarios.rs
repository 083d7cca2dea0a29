//! The four reference scenarios, checked against the exact event stream.

use super::recorded;
use expect_core::{ExpectationKind, MemoryReporter, ReporterEvent, execute_test};

#[test]
fn test_two_passing_expectations() {
    let mut reporter = MemoryReporter::new();
    let passed = execute_test(&mut reporter, "two passes", |ctx| {
        ctx.expect(true, "first");
        ctx.expect_eq("a", "a");
        Ok(())
    });

    assert!(passed);
    let events = reporter.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], ReporterEvent::StartTest("two passes".to_string()));
    assert!(matches!(&events[1], ReporterEvent::AddResult(e) if e.passed));
    assert!(matches!(&events[2], ReporterEvent::AddResult(e) if e.passed));
    assert_eq!(events[3], ReporterEvent::EndTest);
}

#[test]
fn test_failure_does_not_stop_the_body() {
    let mut reporter = MemoryReporter::new();
    let mut reached_end = false;
    let passed = execute_test(&mut reporter, "fail then pass", |ctx| {
        ctx.expect_eq(1 + 1, 3);
        ctx.expect(true, "still running");
        reached_end = true;
        Ok(())
    });

    assert!(!passed);
    assert!(reached_end);
    let kinds: Vec<ExpectationKind> = recorded(&reporter).iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ExpectationKind::Fail, ExpectationKind::Pass]);
    assert_eq!(reporter.events().last(), Some(&ReporterEvent::EndTest));
}

#[test]
fn test_skip_ends_the_body() {
    let mut reporter = MemoryReporter::new();
    let mut after_skip = false;
    let passed = execute_test(&mut reporter, "skipped", |ctx| {
        if ctx.description() == "skipped" {
            return Err(ctx.skip("not implemented"));
        }
        after_skip = true;
        ctx.expect(true, "never recorded");
        Ok(())
    });

    assert!(passed);
    assert!(!after_skip);
    let results = recorded(&reporter);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind, ExpectationKind::Skip);
    assert!(results[0].passed);
    assert_eq!(results[0].message.as_deref(), Some("not implemented"));
    assert_eq!(reporter.events().last(), Some(&ReporterEvent::EndTest));
}

#[inline(never)]
fn lookup(values: &[u32], index: usize) -> u32 {
    values[index]
}

#[test]
fn test_runtime_error_is_recorded_as_failure() {
    let mut reporter = MemoryReporter::new();
    let passed = execute_test(&mut reporter, "runtime error", |ctx| {
        let values = vec![1, 2, 3];
        let value = lookup(&values, std::hint::black_box(7));
        ctx.expect_eq(value, 1);
        Ok(())
    });

    assert!(!passed);
    let results = recorded(&reporter);
    assert_eq!(results.len(), 1);
    assert!(!results[0].passed);
    assert_eq!(results[0].kind, ExpectationKind::Fail);
    assert!(
        results[0]
            .message
            .as_deref()
            .is_some_and(|m| m.contains("index out of bounds"))
    );
    assert!(!results[0].stack.is_empty());
    assert_eq!(reporter.events().last(), Some(&ReporterEvent::EndTest));
}
