//! # posebridge - positional-tracking bridge for VR driver pose pipelines
//!
//! Runs as an in-process plugin inside a host VR driver. The driver calls
//! back with every pose it is about to publish; the bridge substitutes the
//! HMD position reported by an external tracking service (centimeters on
//! the wire, meters in the driver) and can force identity orientation when
//! the user disables the device's own orientation source.
//!
//! The two external collaborators are trait seams:
//! - [`DriverConnection`] - the host driver's pose pipeline
//! - [`TrackingService`] - the positional-tracking service client
//!
//! [`TrackingAdapter::run`] owns the lifecycle: open the driver connection,
//! best-effort service init with bounded retries, hand tracking over to the
//! bridge, block until [`TrackingAdapter::on_quit`], then hand tracking
//! back. A C API for non-Rust hosts lives in [`ffi`].

pub mod adapter;
pub mod config;
pub mod driver;
pub mod error;
pub mod ffi;
pub mod service;
pub mod signal;
pub mod types;

pub use adapter::TrackingAdapter;
pub use config::ServiceConfig;
pub use driver::DriverConnection;
pub use error::BridgeError;
pub use service::TrackingService;
pub use signal::QuitSignal;
pub use types::*;

/// Result type alias for posebridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
