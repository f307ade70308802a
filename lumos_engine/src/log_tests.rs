//! Unit tests for log.rs
//!
//! Tests Logger trait, LogEntry, LogSeverity, DefaultLogger and the
//! error-producing macros.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::lumos::{Engine, Error};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

// ============================================================================
// HELPERS
// ============================================================================

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "lumos::CommandBuffer".to_string(),
        message: "fence reset".to_string(),
        file,
        line,
    }
}

struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

// Other tests log concurrently; only keep entries emitted by this file.
impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.source == "lumos::test" {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }
}

fn install_capture_logger() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: entries.clone() });
    entries
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug_names() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_format_without_location() {
    let text = DefaultLogger::format(&entry(LogSeverity::Info, None, None));
    assert!(text.contains("lumos::CommandBuffer"));
    assert!(text.ends_with("fence reset"));
}

#[test]
fn test_default_logger_format_with_location() {
    let text = DefaultLogger::format(&entry(LogSeverity::Error, Some("command_buffer.rs"), Some(42)));
    assert!(text.contains("fence reset"));
    assert!(text.ends_with("(command_buffer.rs:42)"));
}

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, None, None));
        logger.log(&entry(severity, Some("log_tests.rs"), Some(7)));
    }
}

#[test]
fn test_logger_trait_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
}

// ============================================================================
// MACRO TESTS
// ============================================================================

#[test]
#[serial]
fn test_engine_err_logs_and_returns_backend_error() {
    let entries = install_capture_logger();

    let err = crate::engine_err!("lumos::test", "vkAllocateMemory failed: {}", -2);

    assert_eq!(err, Error::BackendError("vkAllocateMemory failed: -2".to_string()));
    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, LogSeverity::Error);
    assert_eq!(entries[0].source, "lumos::test");
    assert!(entries[0].file.is_some());
    assert!(entries[0].line.is_some());
    drop(entries);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    let entries = install_capture_logger();

    fn failing(fail: bool) -> crate::lumos::Result<u32> {
        if fail {
            crate::engine_bail!("lumos::test", "bailing out");
        }
        Ok(7)
    }

    assert_eq!(failing(false), Ok(7));
    assert!(matches!(failing(true), Err(Error::BackendError(_))));
    assert_eq!(entries.lock().unwrap().len(), 1);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_assert_passes_silently() {
    let entries = install_capture_logger();
    crate::engine_assert!(1 + 1 == 2, "lumos::test", "arithmetic is broken");
    assert!(entries.lock().unwrap().is_empty());
    Engine::reset_logger();
}

#[test]
#[serial]
#[should_panic(expected = "secondary buffer misuse")]
fn test_engine_assert_panics_with_message() {
    crate::engine_assert!(false, "lumos::test", "secondary buffer misuse");
}

#[test]
#[serial]
fn test_severity_macros_route_to_installed_logger() {
    let entries = install_capture_logger();

    crate::engine_trace!("lumos::test", "trace {}", 1);
    crate::engine_debug!("lumos::test", "debug {}", 2);
    crate::engine_info!("lumos::test", "info {}", 3);
    crate::engine_warn!("lumos::test", "warn {}", 4);
    crate::engine_error!("lumos::test", "error {}", 5);

    let entries = entries.lock().unwrap();
    let severities: Vec<LogSeverity> = entries.iter().map(|e| e.severity).collect();
    assert_eq!(severities, vec![
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ]);
    assert_eq!(entries[2].message, "info 3");
    assert!(entries[2].file.is_none());
    assert!(entries[4].file.is_some());
    drop(entries);
    Engine::reset_logger();
}
