//! Unit tests for Engine singleton manager
//!
//! Tests initialization, graphics device registration and logging APIs.
//!
//! IMPORTANT: ENGINE_STATE is a global OnceLock shared across all tests.
//! All tests are marked with #[serial] to run sequentially and avoid RwLock poisoning.

use crate::lumos::{Engine, Error};
use crate::lumos::log::{Logger, LogEntry, LogSeverity};
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{GraphicsApi, GraphicsDevice};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<String>>>,
}

impl TestLogger {
    fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.push(format!("{:?}: {}", entry.severity, entry.message));
    }
}

fn mock_device() -> Arc<dyn GraphicsDevice> {
    Arc::new(MockGraphicsDevice::new())
}

/// Reset engine state before each test
fn setup() {
    Engine::reset_for_testing();
    Engine::reset_logger();
    let _ = Engine::initialize();
}

// ============================================================================
// INITIALIZATION AND SHUTDOWN TESTS
// ============================================================================

#[test]
#[serial]
fn test_engine_initialize() {
    setup();
    assert!(Engine::initialize().is_ok());
}

#[test]
#[serial]
fn test_multiple_initialize_calls_idempotent() {
    setup();

    Engine::initialize().unwrap();
    Engine::initialize().unwrap();

    assert!(Engine::create_graphics_device(mock_device()).is_ok());
}

#[test]
#[serial]
fn test_shutdown_clears_graphics_device() {
    setup();

    Engine::create_graphics_device(mock_device()).unwrap();
    assert!(Engine::graphics_device().is_ok());

    Engine::shutdown();
    Engine::initialize().unwrap();

    assert!(Engine::graphics_device().is_err());
}

#[test]
#[serial]
fn test_shutdown_idempotent() {
    setup();

    Engine::shutdown();
    Engine::shutdown();

    Engine::initialize().unwrap();
}

// ============================================================================
// GRAPHICS DEVICE TESTS
// ============================================================================

#[test]
#[serial]
fn test_create_graphics_device_success() {
    setup();

    Engine::create_graphics_device(mock_device()).unwrap();

    let device = Engine::graphics_device().unwrap();
    assert_eq!(device.api(), GraphicsApi::Vulkan);
}

#[test]
#[serial]
fn test_graphics_device_shared_instance() {
    setup();

    let device = mock_device();
    Engine::create_graphics_device(device.clone()).unwrap();

    assert!(Arc::ptr_eq(&device, &Engine::graphics_device().unwrap()));
}

#[test]
#[serial]
fn test_second_graphics_device_fails() {
    setup();

    Engine::create_graphics_device(mock_device()).unwrap();
    let result = Engine::create_graphics_device(mock_device());

    match result {
        Err(Error::InitializationFailed(msg)) => assert!(msg.contains("already exists")),
        _ => panic!("Expected InitializationFailed"),
    }
}

#[test]
#[serial]
fn test_graphics_device_missing_fails() {
    setup();

    match Engine::graphics_device() {
        Err(Error::InitializationFailed(msg)) => assert!(msg.contains("not created")),
        _ => panic!("Expected InitializationFailed"),
    }
}

#[test]
#[serial]
fn test_destroy_then_recreate_graphics_device() {
    setup();

    Engine::create_graphics_device(mock_device()).unwrap();
    Engine::destroy_graphics_device().unwrap();
    assert!(Engine::graphics_device().is_err());

    assert!(Engine::create_graphics_device(mock_device()).is_ok());
}

// ============================================================================
// LOGGING TESTS
// ============================================================================

#[test]
#[serial]
fn test_log_detailed_with_file_line() {
    setup();

    let test_logger = TestLogger::new();
    let entries_ref = test_logger.entries.clone();
    Engine::set_logger(test_logger);

    Engine::log_detailed(
        LogSeverity::Error,
        "lumos::test",
        "Detailed error".to_string(),
        "test.rs",
        42,
    );

    let entries = entries_ref.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].contains("Error"));
    assert!(entries[0].contains("Detailed error"));
}

#[test]
#[serial]
fn test_custom_logger_receives_logs() {
    setup();

    let test_logger = TestLogger::new();
    let entries_ref = test_logger.entries.clone();
    Engine::set_logger(test_logger);

    Engine::log(LogSeverity::Trace, "test", "Trace".to_string());
    Engine::log(LogSeverity::Debug, "test", "Debug".to_string());
    Engine::log(LogSeverity::Info, "test", "Info".to_string());
    Engine::log(LogSeverity::Warn, "test", "Warn".to_string());
    Engine::log(LogSeverity::Error, "test", "Error".to_string());

    assert_eq!(entries_ref.lock().unwrap().len(), 5);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_errors_are_logged_before_returning() {
    setup();

    let test_logger = TestLogger::new();
    let entries_ref = test_logger.entries.clone();
    Engine::set_logger(test_logger);

    let _ = Engine::graphics_device();

    let entries = entries_ref.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("Error"));
    drop(entries);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_registration_logs_api() {
    setup();

    let test_logger = TestLogger::new();
    let entries_ref = test_logger.entries.clone();
    Engine::set_logger(test_logger);

    Engine::create_graphics_device(mock_device()).unwrap();

    let entries = entries_ref.lock().unwrap();
    assert!(entries.iter().any(|e| e == "Info: Graphics device registered (Vulkan)"));
    drop(entries);
    Engine::reset_logger();
}
