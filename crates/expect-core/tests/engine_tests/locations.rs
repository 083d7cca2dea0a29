use super::{frame_positions_available, recorded};
use expect_core::{MemoryReporter, Signal, TestContext, execute_test};

/// Assertion helper that does not know its own call site.
#[inline(never)]
fn expect_positive(ctx: &mut TestContext<'_>, value: i64) {
    let _ = ctx.raise(Signal::expectation(value > 0, None));
}

#[test]
fn test_track_caller_location() {
    let mut reporter = MemoryReporter::new();
    let mut expected_line = 0;
    execute_test(&mut reporter, "located", |ctx| {
        expected_line = line!() + 1;
        ctx.expect_eq(3, 4);
        Ok(())
    });

    let results = recorded(&reporter);
    let location = results[0].location.as_ref();
    assert_eq!(location.map(|l| l.start_line), Some(expected_line));
    assert!(location.is_some_and(|l| l.file.ends_with("locations.rs")));
}

#[test]
fn test_resolved_location_points_at_helper_call() {
    let mut reporter = MemoryReporter::new();
    let mut expected_line = 0;
    execute_test(&mut reporter, "resolved", |ctx| {
        expected_line = line!() + 1;
        expect_positive(ctx, -1);
        Ok(())
    });

    let results = recorded(&reporter);
    assert_eq!(results.len(), 1);
    assert!(!results[0].passed);
    if !frame_positions_available() {
        // Unlocated, but still recorded as a failure.
        return;
    }
    let location = results[0].location.as_ref();
    assert!(location.is_some_and(|l| l.file.ends_with("locations.rs")));
    assert_eq!(location.map(|l| l.start_line), Some(expected_line));
}

#[test]
fn test_assert_macro_panic_points_at_assertion() {
    let mut reporter = MemoryReporter::new();
    let mut expected_line = 0;
    let passed = execute_test(&mut reporter, "assert macro", |_| {
        expected_line = line!() + 1;
        assert_eq!(std::hint::black_box(1) + 1, 3, "arithmetic");
        Ok(())
    });

    assert!(!passed);
    let results = recorded(&reporter);
    assert!(
        results[0]
            .message
            .as_deref()
            .is_some_and(|m| m.contains("arithmetic"))
    );
    let location = results[0].location.as_ref();
    assert_eq!(location.map(|l| l.start_line), Some(expected_line));
}

#[test]
fn test_skip_location_is_call_site() {
    let mut reporter = MemoryReporter::new();
    let mut expected_line = 0;
    execute_test(&mut reporter, "skip site", |ctx| {
        expected_line = line!() + 1;
        Err(ctx.skip("pending"))
    });

    let results = recorded(&reporter);
    assert_eq!(
        results[0].location.as_ref().map(|l| l.start_line),
        Some(expected_line)
    );
}
