//! Integration tests for the engine logger through the public API
//!
//! No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests

use std::sync::{Arc, Mutex};
use lumos_engine::lumos::log::{LogEntry, LogSeverity, Logger};
use lumos_engine::lumos::render::ShaderDesc;
use lumos_engine::lumos::Engine;
use serial_test::serial;

/// Keeps (severity, source, message, has location) per entry
#[derive(Clone, Default)]
struct CapturingLogger {
    entries: Arc<Mutex<Vec<(LogSeverity, String, String, bool)>>>,
}

impl Logger for CapturingLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push((
            entry.severity,
            entry.source.clone(),
            entry.message.clone(),
            entry.file.is_some() && entry.line.is_some(),
        ));
    }
}

fn capture() -> Arc<Mutex<Vec<(LogSeverity, String, String, bool)>>> {
    let logger = CapturingLogger::default();
    let entries = logger.entries.clone();
    Engine::set_logger(logger);
    entries
}

#[test]
#[serial]
fn test_entries_keep_source_and_order() {
    let entries = capture();

    Engine::log(LogSeverity::Info, "app::loader", "first".to_string());
    Engine::log(LogSeverity::Warn, "app::loader", "second".to_string());

    let captured = entries.lock().unwrap().clone();
    Engine::reset_logger();

    assert_eq!(
        captured,
        vec![
            (LogSeverity::Info, "app::loader".to_string(), "first".to_string(), false),
            (LogSeverity::Warn, "app::loader".to_string(), "second".to_string(), false),
        ]
    );
}

#[test]
#[serial]
fn test_load_failure_logged_with_location() {
    let entries = capture();

    let result = ShaderDesc::load("missing", std::path::Path::new("/nonexistent/lumos"));

    let captured = entries.lock().unwrap().clone();
    Engine::reset_logger();

    assert!(result.is_err());
    assert_eq!(captured.len(), 1);
    let (severity, source, message, located) = &captured[0];
    assert_eq!(*severity, LogSeverity::Error);
    assert_eq!(source, "lumos::Shader");
    assert!(message.starts_with("Failed to read shader"));
    assert!(*located);
}

#[test]
#[serial]
fn test_engine_errors_reach_custom_logger() {
    let entries = capture();

    let _ = Engine::initialize();
    let _ = Engine::destroy_graphics_device();
    let result = Engine::graphics_device();

    let captured = entries.lock().unwrap().clone();
    Engine::reset_logger();

    assert!(result.is_err());
    assert!(captured
        .iter()
        .any(|(severity, source, _, _)| *severity == LogSeverity::Error && source == "lumos::Engine"));
}

#[test]
#[serial]
fn test_reset_restores_default_logger() {
    let entries = capture();
    Engine::reset_logger();

    Engine::log(LogSeverity::Debug, "app", "not captured".to_string());

    assert!(entries.lock().unwrap().is_empty());
}

#[test]
fn test_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}
