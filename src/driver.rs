use crate::types::DriverPose;
use crate::Result;

/// Connection to the host VR driver.
///
/// The driver owns the canonical pose pipeline; the bridge only toggles
/// which source feeds it and hands substituted poses back. Implementations
/// wrap the driver framework's client library (or its C API through the
/// [`ffi`](crate::ffi) vtable).
pub trait DriverConnection {
    /// Open the connection. Failures carry the driver's own numeric error
    /// code as [`BridgeError::Driver`](crate::BridgeError::Driver).
    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    /// Tell the driver whether this bridge is supplying pose data.
    fn set_tracking_enabled(&mut self, enabled: bool);

    /// Toggle the driver's native orientation source.
    fn set_device_orientation_enabled(&mut self, enabled: bool);

    /// One-way pose notification back into the driver's pipeline.
    fn publish_pose(&mut self, pose: &DriverPose);
}
