/// Identity rotation quaternion [w, x, y, z]. Substituted into published
/// poses while the device's own orientation source is disabled.
pub const IDENTITY_ROTATION: [f64; 4] = [1.0, 0.0, 0.0, 0.0];

/// The tracking service reports positions in centimeters; the driver's
/// pose pipeline is in meters.
pub const CENTIMETERS_TO_METERS: f64 = 0.01;

/// Rest position before the first service sample: 1 m above the origin.
pub const DEFAULT_POSITION: [f64; 3] = [0.0, 1.0, 0.0];

/// A pose as exchanged with the host driver.
///
/// The bridge copies the input pose through and only rewrites `position`
/// (and `rotation` while the orientation override is active).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverPose {
    /// Position [x, y, z] in meters.
    pub position: [f64; 3],
    /// Rotation quaternion [w, x, y, z].
    pub rotation: [f64; 4],
    /// Linear velocity [x, y, z] in m/s.
    pub velocity: [f64; 3],
    /// Angular velocity [x, y, z] in rad/s.
    pub angular_velocity: [f64; 3],
    pub pose_is_valid: bool,
    pub device_is_connected: bool,
}

impl Default for DriverPose {
    fn default() -> Self {
        Self {
            position: DEFAULT_POSITION,
            rotation: IDENTITY_ROTATION,
            velocity: [0.0; 3],
            angular_velocity: [0.0; 3],
            pose_is_valid: true,
            device_is_connected: true,
        }
    }
}

/// Service-assigned index of a tracked head-mounted device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HmdId(pub u32);

/// Raw HMD position sample as reported by the tracking service, in
/// centimeters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HmdPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

bitflags::bitflags! {
    /// Content selection flags for an HMD data stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct StreamFlags: u32 {
        const INCLUDE_POSITION          = 1 << 0;
        const INCLUDE_PHYSICS           = 1 << 1;
        const INCLUDE_RAW_SENSOR        = 1 << 2;
        const INCLUDE_CALIBRATED_SENSOR = 1 << 3;
        const INCLUDE_RAW_TRACKER       = 1 << 4;
    }
}
