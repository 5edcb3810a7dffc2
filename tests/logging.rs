// tests/logging.rs

use dockhand::cli::LogLevel;
use dockhand::logging::build_filter;

#[test]
fn cli_level_applies_to_dockhand_modules() {
    let filter = build_filter(Some(LogLevel::Debug), Some("trace")).expect("valid filter");
    let rendered = filter.to_string();
    assert!(rendered.contains("dockhand=debug"));
    assert!(!rendered.contains("trace"));
}

#[test]
fn environment_directives_are_used_verbatim() {
    let filter = build_filter(None, Some(" dockhand::docker=trace ")).expect("valid filter");
    assert!(filter.to_string().contains("dockhand::docker=trace"));
}

#[test]
fn default_keeps_step_progress_visible() {
    let filter = build_filter(None, None).expect("valid filter");
    assert!(filter.to_string().contains("dockhand::exec=info"));

    let blank = build_filter(None, Some("  ")).expect("valid filter");
    assert_eq!(blank.to_string(), filter.to_string());
}

#[test]
fn malformed_environment_filter_is_an_error() {
    let err = build_filter(None, Some("dockhand=loud")).unwrap_err();
    assert!(err.to_string().contains("invalid DOCKHAND_LOG filter"));
}
