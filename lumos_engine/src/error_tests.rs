//! Unit tests for error.rs
//!
//! Tests the Error variants, their Display text and propagation through Result.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit returned ERROR_DEVICE_LOST".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Backend error"));
    assert!(display.contains("ERROR_DEVICE_LOST"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("framebuffer has 2 attachments, render pass expects 3".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid resource"));
    assert!(display.contains("render pass expects 3"));
}

#[test]
fn test_unsupported_configuration_display() {
    let err = Error::UnsupportedConfiguration("48 bits per pixel".to_string());
    assert_eq!(format!("{}", err), "Unsupported configuration: 48 bits per pixel");
}

#[test]
fn test_resource_load_failed_display() {
    let err = Error::ResourceLoadFailed("/Textures/missing.png".to_string());
    assert_eq!(format!("{}", err), "Resource load failed: /Textures/missing.png");
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("no suitable GPU".to_string());
    assert!(format!("{}", err).contains("Initialization failed"));
}

// ============================================================================
// TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_clone_and_eq() {
    let err = Error::InvalidResource("texture".to_string());
    assert_eq!(err.clone(), err);
    assert_ne!(err, Error::InvalidResource("shader".to_string()));
}

// ============================================================================
// PROPAGATION TESTS
// ============================================================================

#[test]
fn test_error_propagation_with_question_mark() {
    fn inner() -> Result<u32> {
        Err(Error::OutOfMemory)
    }

    fn outer() -> Result<u32> {
        let value = inner()?;
        Ok(value + 1)
    }

    assert_eq!(outer(), Err(Error::OutOfMemory));
}
