use std::fmt;

/// Errors that can occur while bridging tracking data into the driver.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The host driver refused the connection; carries the driver's own
    /// numeric error code.
    #[error("driver connection failed (driver error code {0})")]
    Driver(i32),

    #[error("adapter has already run; instances are single-run")]
    AlreadyRan,

    #[error("tracking service call failed: {0}")]
    Service(String),

    #[error("timeout waiting for the tracking service")]
    Timeout,

    #[error("no head-mounted device listed by the tracking service")]
    NoHmd,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &BridgeError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
