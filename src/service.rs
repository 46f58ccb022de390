use crate::types::{HmdId, HmdPosition, StreamFlags};
use crate::Result;
use std::time::Duration;

/// Client for the external positional-tracking service.
///
/// Mirrors the service's session API: connect once, snapshot the tracked
/// HMD list, register a listener per device and stream the data it selects
/// via [`StreamFlags`], then pull updates sample by sample. The network
/// client and wire protocol behind this live outside the bridge.
pub trait TrackingService {
    fn initialize(&mut self, address: &str, port: u16, timeout: Duration) -> Result<()>;

    /// Tear the client down. Safe to call on a partially configured session.
    fn shutdown(&mut self);

    /// Snapshot of the HMDs the service currently tracks.
    fn hmd_list(&mut self, timeout: Duration) -> Result<Vec<HmdId>>;

    fn allocate_hmd_listener(&mut self, hmd: HmdId) -> Result<()>;

    fn free_hmd_listener(&mut self, hmd: HmdId) -> Result<()>;

    fn start_hmd_data_stream(
        &mut self,
        hmd: HmdId,
        flags: StreamFlags,
        timeout: Duration,
    ) -> Result<()>;

    fn stop_hmd_data_stream(&mut self, hmd: HmdId, timeout: Duration) -> Result<()>;

    /// Pull one update from the service, refreshing listener state.
    fn update(&mut self) -> Result<()>;

    /// Latest position of `hmd`, in centimeters.
    fn hmd_position(&mut self, hmd: HmdId) -> Result<HmdPosition>;
}
