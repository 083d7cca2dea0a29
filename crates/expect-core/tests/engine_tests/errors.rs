use super::{lifecycle_counts, recorded};
use expect_core::{
    EngineConfig, ExpectationKind, Interrupt, MemoryReporter, execute_test, execute_test_with,
};
use std::path::Path;

#[inline(never)]
fn load_fixture(values: &[u32], index: usize) -> u32 {
    values[index]
}

#[inline(never)]
fn parse_fixture(values: &[u32]) -> u32 {
    load_fixture(values, std::hint::black_box(10)) + 1
}

#[inline(never)]
fn read_missing(dir: &Path) -> Result<String, Interrupt> {
    Ok(std::fs::read_to_string(dir.join("missing.txt"))?)
}

#[test]
fn test_panic_at_depth_keeps_user_chain() {
    let mut reporter = MemoryReporter::new();
    let passed = execute_test(&mut reporter, "deep panic", |ctx| {
        let value = parse_fixture(&[1, 2]);
        ctx.expect_eq(value, 2);
        Ok(())
    });

    assert!(!passed);
    let results = recorded(&reporter);
    assert_eq!(results.len(), 1);
    let names: Vec<&str> = results[0].stack.iter().map(|f| f.function.as_str()).collect();

    let load = names.iter().position(|n| n.ends_with("load_fixture"));
    let parse = names.iter().position(|n| n.ends_with("parse_fixture"));
    assert!(load.is_some(), "stack: {names:?}");
    assert!(parse.is_some(), "stack: {names:?}");
    // Most recent first.
    assert!(load < parse);

    assert!(!names.iter().any(|n| n.starts_with("expect_core::")));
    assert!(!names.iter().any(|n| n.starts_with("std::panicking")));
    assert!(
        results[0]
            .location
            .as_ref()
            .is_some_and(|l| l.file.ends_with("errors.rs"))
    );
}

#[test]
fn test_question_mark_error_is_recorded() -> Result<(), std::io::Error> {
    let dir = tempfile::TempDir::new()?;
    let mut reporter = MemoryReporter::new();
    let mut after_error = false;
    let passed = execute_test(&mut reporter, "io error", |ctx| {
        ctx.expect(true, "setup");
        let content = read_missing(dir.path())?;
        after_error = true;
        ctx.expect(content.is_empty(), "content");
        Ok(())
    });

    assert!(!passed);
    assert!(!after_error);
    let results = recorded(&reporter);
    assert_eq!(results.len(), 2);
    assert!(results[0].passed);
    assert_eq!(results[1].kind, ExpectationKind::Fail);
    assert!(
        results[1]
            .stack
            .iter()
            .any(|f| f.function.ends_with("read_missing"))
    );
    assert!(results[1].location.is_some());
    Ok(())
}

#[test]
fn test_explicit_error_interrupt() {
    let mut reporter = MemoryReporter::new();
    let passed = execute_test(&mut reporter, "explicit", |_| {
        Err(Interrupt::error("backend unavailable"))
    });

    assert!(!passed);
    let results = recorded(&reporter);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].message.as_deref(), Some("backend unavailable"));
    assert_eq!(lifecycle_counts(&reporter), (1, 1));
}

#[test]
fn test_capture_disabled_keeps_origin_only() {
    let config = EngineConfig {
        capture_stack: false,
        ..EngineConfig::default()
    };
    let mut reporter = MemoryReporter::new();
    let passed = execute_test_with(&config, &mut reporter, "no capture", |ctx| {
        let value = load_fixture(&[], std::hint::black_box(0));
        ctx.expect_eq(value, 0);
        Ok(())
    });

    assert!(!passed);
    let results = recorded(&reporter);
    assert_eq!(results.len(), 1);
    assert!(results[0].stack.is_empty());
    assert!(results[0].location.is_some());
}

#[test]
fn test_stack_is_bounded() {
    let config = EngineConfig {
        max_stack_frames: 1,
        ..EngineConfig::default()
    };
    let mut reporter = MemoryReporter::new();
    execute_test_with(&config, &mut reporter, "bounded", |_| {
        parse_fixture(&[]);
        Ok(())
    });

    let results = recorded(&reporter);
    assert_eq!(results.len(), 1);
    assert!(results[0].stack.len() <= 1);
}

#[test]
fn test_panic_outside_tests_is_untouched() {
    let mut reporter = MemoryReporter::new();
    execute_test(&mut reporter, "before", |_| Ok(()));

    let caught = std::panic::catch_unwind(|| load_fixture(&[], 3));
    assert!(caught.is_err());
}

#[test]
fn test_sibling_tests_are_independent() {
    let mut reporter = MemoryReporter::new();
    let first = execute_test(&mut reporter, "errors", |_| Err(Interrupt::error("boom")));
    let second = execute_test(&mut reporter, "passes", |ctx| {
        ctx.expect(true, "fine");
        Ok(())
    });

    assert!(!first);
    assert!(second);
    assert_eq!(lifecycle_counts(&reporter), (2, 2));
}
