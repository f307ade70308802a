/// Lumos Engine - process-wide registry for the logger and the graphics device
///
/// The active backend is chosen once at startup: the application builds a
/// concrete `GraphicsDevice` (Vulkan or OpenGL) and registers it here. Every
/// renderer receives the same `Arc<dyn GraphicsDevice>` as its factory.

use std::sync::{OnceLock, RwLock, Arc};
use std::time::SystemTime;
use crate::graphics_device::GraphicsDevice;
use crate::error::{Result, Error};
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Internal state structure holding all engine singletons
struct EngineState {
    /// The graphics device selected at startup
    graphics_device: RwLock<Option<Arc<dyn GraphicsDevice>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            graphics_device: RwLock::new(None),
        }
    }
}

// ===== PUBLIC API =====

/// Main engine singleton manager
///
/// # Example
///
/// ```no_run
/// use lumos_engine::lumos::Engine;
/// # fn device() -> std::sync::Arc<dyn lumos_engine::lumos::render::GraphicsDevice> { unimplemented!() }
///
/// Engine::initialize()?;
/// Engine::create_graphics_device(device())?;
///
/// let device = Engine::graphics_device()?;
///
/// Engine::shutdown();
/// # Ok::<(), lumos_engine::lumos::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Log errors before returning them
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("lumos::Engine", "Initialization failed: {}", msg);
            }
            Error::BackendError(msg) => {
                crate::engine_error!("lumos::Engine", "Backend error: {}", msg);
            }
            _ => {
                crate::engine_error!("lumos::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    fn state() -> Result<&'static EngineState> {
        ENGINE_STATE.get().ok_or_else(|| Self::log_and_return_error(
            Error::InitializationFailed("Engine not initialized. Call Engine::initialize() first.".to_string())
        ))
    }

    /// Initialize the engine (idempotent)
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.get_or_init(EngineState::new);
        Ok(())
    }

    /// Drop the registered graphics device
    ///
    /// Renderers that still hold a clone of the device keep it alive until
    /// they are dropped.
    pub fn shutdown() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut device) = state.graphics_device.write() {
                *device = None;
            }
        }
    }

    // ===== GRAPHICS DEVICE API =====

    /// Register the graphics device for the whole process
    ///
    /// # Errors
    ///
    /// - the engine is not initialized
    /// - a device is already registered (the backend is selected once)
    pub fn create_graphics_device(device: Arc<dyn GraphicsDevice>) -> Result<()> {
        let state = Self::state()?;

        let mut lock = state.graphics_device.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("GraphicsDevice lock poisoned".to_string())
            ))?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("GraphicsDevice already exists. Call Engine::destroy_graphics_device() first.".to_string())
            ));
        }

        let api = device.api();
        *lock = Some(device);

        crate::engine_info!("lumos::Engine", "Graphics device registered ({:?})", api);

        Ok(())
    }

    /// Get the registered graphics device
    pub fn graphics_device() -> Result<Arc<dyn GraphicsDevice>> {
        let state = Self::state()?;

        let lock = state.graphics_device.read()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("GraphicsDevice lock poisoned".to_string())
            ))?;

        lock.clone()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("GraphicsDevice not created. Call Engine::create_graphics_device() first.".to_string())
            ))
    }

    /// Remove the registered graphics device
    pub fn destroy_graphics_device() -> Result<()> {
        let state = Self::state()?;

        let mut lock = state.graphics_device.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("GraphicsDevice lock poisoned".to_string())
            ))?;

        *lock = None;

        crate::engine_info!("lumos::Engine", "Graphics device destroyed");

        Ok(())
    }

    /// Reset all singletons for testing
    #[cfg(test)]
    pub fn reset_for_testing() {
        Self::shutdown();
    }

    // ===== LOGGING API =====

    /// Replace the default logger with a custom implementation
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Log without file:line (used by engine_info!, engine_warn!, ...)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(severity, source, message, None, None);
    }

    /// Log with file:line (used by engine_error!, engine_err!, engine_assert!)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        Self::dispatch(severity, source, message, Some(file), Some(line));
    }

    fn dispatch(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: Option<&'static str>,
        line: Option<u32>,
    ) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file,
                line,
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
