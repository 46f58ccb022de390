//! C FFI layer for posebridge.
//!
//! Lets a non-Rust driver framework host the bridge: the host fills in a
//! driver-callback vtable and a service-call vtable (typically thin shims
//! over the tracking service's own C client API), creates an opaque
//! adapter handle, and drives the `pb_adapter_*` entry points. The
//! generated C header is written to `include/posebridge.h` by cbindgen.

use crate::adapter::TrackingAdapter;
use crate::config::ServiceConfig;
use crate::driver::DriverConnection;
use crate::error::LastError;
use crate::service::TrackingService;
use crate::types::{DriverPose, HmdId, HmdPosition, StreamFlags};
use crate::{BridgeError, Result};
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::time::Duration;

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Largest HMD list the bridge will request from the host.
const MAX_HMDS: usize = 16;

/// Host-driver callbacks. Functions returning `int` use 0 for success and
/// a driver-defined error code otherwise. Null entries are treated as
/// no-ops (success).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PbDriverVtable {
    /// Passed back as the first argument of every callback.
    pub user_data: *mut c_void,
    pub open: Option<unsafe extern "C" fn(user_data: *mut c_void) -> c_int>,
    pub close: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
    pub set_tracking_enabled: Option<unsafe extern "C" fn(user_data: *mut c_void, enabled: bool)>,
    pub set_device_orientation_enabled:
        Option<unsafe extern "C" fn(user_data: *mut c_void, enabled: bool)>,
    pub publish_pose:
        Option<unsafe extern "C" fn(user_data: *mut c_void, pose: *const DriverPose)>,
}

/// Tracking-service calls. Functions returning `int` use 0 for success and
/// a service-defined error code otherwise. Null entries are treated as
/// no-ops, except `hmd_position` which then reports no device.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PbServiceVtable {
    /// Passed back as the first argument of every call.
    pub user_data: *mut c_void,
    pub initialize: Option<
        unsafe extern "C" fn(
            user_data: *mut c_void,
            address: *const c_char,
            port: u16,
            timeout_ms: u32,
        ) -> c_int,
    >,
    pub shutdown: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
    /// Writes up to `max` HMD ids into `out`; returns the number of tracked
    /// HMDs, or a negative value on error.
    pub hmd_list: Option<
        unsafe extern "C" fn(
            user_data: *mut c_void,
            out: *mut u32,
            max: c_int,
            timeout_ms: u32,
        ) -> c_int,
    >,
    pub allocate_hmd_listener:
        Option<unsafe extern "C" fn(user_data: *mut c_void, hmd: u32) -> c_int>,
    pub free_hmd_listener: Option<unsafe extern "C" fn(user_data: *mut c_void, hmd: u32) -> c_int>,
    pub start_hmd_data_stream: Option<
        unsafe extern "C" fn(user_data: *mut c_void, hmd: u32, flags: u32, timeout_ms: u32) -> c_int,
    >,
    pub stop_hmd_data_stream:
        Option<unsafe extern "C" fn(user_data: *mut c_void, hmd: u32, timeout_ms: u32) -> c_int>,
    pub update: Option<unsafe extern "C" fn(user_data: *mut c_void) -> c_int>,
    pub hmd_position: Option<
        unsafe extern "C" fn(user_data: *mut c_void, hmd: u32, out: *mut HmdPosition) -> c_int,
    >,
}

struct VtableDriver(PbDriverVtable);

// Safety: the host guarantees `user_data` stays valid for the adapter's
// lifetime and that the callbacks tolerate the thread `pb_adapter_run`
// blocks on.
unsafe impl Send for VtableDriver {}

struct VtableService(PbServiceVtable);

// Safety: as for VtableDriver.
unsafe impl Send for VtableService {}

fn timeout_ms(timeout: Duration) -> u32 {
    timeout.as_millis().min(u32::MAX as u128) as u32
}

fn service_code(call: &str, code: c_int) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(BridgeError::Service(format!("{} returned {}", call, code)))
    }
}

impl DriverConnection for VtableDriver {
    fn open(&mut self) -> Result<()> {
        let Some(open) = self.0.open else {
            return Ok(());
        };
        let code = unsafe { open(self.0.user_data) };
        if code == 0 {
            Ok(())
        } else {
            Err(BridgeError::Driver(code))
        }
    }

    fn close(&mut self) {
        if let Some(close) = self.0.close {
            unsafe { close(self.0.user_data) };
        }
    }

    fn set_tracking_enabled(&mut self, enabled: bool) {
        if let Some(f) = self.0.set_tracking_enabled {
            unsafe { f(self.0.user_data, enabled) };
        }
    }

    fn set_device_orientation_enabled(&mut self, enabled: bool) {
        if let Some(f) = self.0.set_device_orientation_enabled {
            unsafe { f(self.0.user_data, enabled) };
        }
    }

    fn publish_pose(&mut self, pose: &DriverPose) {
        if let Some(f) = self.0.publish_pose {
            unsafe { f(self.0.user_data, pose) };
        }
    }
}

impl TrackingService for VtableService {
    fn initialize(&mut self, address: &str, port: u16, timeout: Duration) -> Result<()> {
        let Some(f) = self.0.initialize else {
            return Ok(());
        };
        let address = CString::new(address)
            .map_err(|_| BridgeError::Service("service address contains NUL".into()))?;
        let code = unsafe { f(self.0.user_data, address.as_ptr(), port, timeout_ms(timeout)) };
        service_code("initialize", code)
    }

    fn shutdown(&mut self) {
        if let Some(f) = self.0.shutdown {
            unsafe { f(self.0.user_data) };
        }
    }

    fn hmd_list(&mut self, timeout: Duration) -> Result<Vec<HmdId>> {
        let Some(f) = self.0.hmd_list else {
            return Ok(Vec::new());
        };
        let mut ids = [0u32; MAX_HMDS];
        let count = unsafe {
            f(
                self.0.user_data,
                ids.as_mut_ptr(),
                MAX_HMDS as c_int,
                timeout_ms(timeout),
            )
        };
        if count < 0 {
            return Err(BridgeError::Service(format!("hmd_list returned {}", count)));
        }
        let count = (count as usize).min(MAX_HMDS);
        Ok(ids[..count].iter().map(|&id| HmdId(id)).collect())
    }

    fn allocate_hmd_listener(&mut self, hmd: HmdId) -> Result<()> {
        let Some(f) = self.0.allocate_hmd_listener else {
            return Ok(());
        };
        service_code("allocate_hmd_listener", unsafe {
            f(self.0.user_data, hmd.0)
        })
    }

    fn free_hmd_listener(&mut self, hmd: HmdId) -> Result<()> {
        let Some(f) = self.0.free_hmd_listener else {
            return Ok(());
        };
        service_code("free_hmd_listener", unsafe { f(self.0.user_data, hmd.0) })
    }

    fn start_hmd_data_stream(
        &mut self,
        hmd: HmdId,
        flags: StreamFlags,
        timeout: Duration,
    ) -> Result<()> {
        let Some(f) = self.0.start_hmd_data_stream else {
            return Ok(());
        };
        service_code("start_hmd_data_stream", unsafe {
            f(self.0.user_data, hmd.0, flags.bits(), timeout_ms(timeout))
        })
    }

    fn stop_hmd_data_stream(&mut self, hmd: HmdId, timeout: Duration) -> Result<()> {
        let Some(f) = self.0.stop_hmd_data_stream else {
            return Ok(());
        };
        service_code("stop_hmd_data_stream", unsafe {
            f(self.0.user_data, hmd.0, timeout_ms(timeout))
        })
    }

    fn update(&mut self) -> Result<()> {
        let Some(f) = self.0.update else {
            return Ok(());
        };
        service_code("update", unsafe { f(self.0.user_data) })
    }

    fn hmd_position(&mut self, hmd: HmdId) -> Result<HmdPosition> {
        let Some(f) = self.0.hmd_position else {
            return Err(BridgeError::NoHmd);
        };
        let mut out = HmdPosition::default();
        service_code("hmd_position", unsafe {
            f(self.0.user_data, hmd.0, &mut out)
        })?;
        Ok(out)
    }
}

/// Opaque adapter handle for C consumers.
pub struct PbAdapter(TrackingAdapter<VtableDriver, VtableService>);

/// Create a tracking adapter over host-supplied vtables.
///
/// `address` may be null (and `port` 0) to use the built-in service
/// endpoint defaults. Returns null if either vtable pointer is null.
///
/// # Safety
/// `driver` and `service` must point to valid vtables; their `user_data`
/// pointers and functions must stay valid until `pb_adapter_destroy`.
#[no_mangle]
pub unsafe extern "C" fn pb_adapter_create(
    driver: *const PbDriverVtable,
    service: *const PbServiceVtable,
    address: *const c_char,
    port: u16,
) -> *mut PbAdapter {
    if driver.is_null() || service.is_null() {
        return std::ptr::null_mut();
    }

    let mut config = ServiceConfig::default();
    if !address.is_null() {
        if let Ok(s) = CStr::from_ptr(address).to_str() {
            if !s.is_empty() {
                config.address = s.to_string();
            }
        }
    }
    if port != 0 {
        config.port = port;
    }

    let adapter = TrackingAdapter::new(VtableDriver(*driver), VtableService(*service), config);
    Box::into_raw(Box::new(PbAdapter(adapter)))
}

/// Run the bridge lifecycle; blocks until `pb_adapter_on_quit`.
///
/// Returns 0 on success, the driver's error code if the connection could
/// not be opened, or -1 for other failures (query
/// `pb_last_error_message`).
///
/// # Safety
/// `adapter` must be a handle from `pb_adapter_create` that has not been
/// destroyed.
#[no_mangle]
pub unsafe extern "C" fn pb_adapter_run(adapter: *mut PbAdapter) -> c_int {
    let Some(adapter) = adapter.as_ref() else {
        return -1;
    };
    match adapter.0.run() {
        Ok(()) => 0,
        Err(e) => {
            LAST_ERROR.set(&e);
            match e {
                BridgeError::Driver(code) => code,
                _ => -1,
            }
        }
    }
}

/// Driver callback: a pose is about to be published.
///
/// # Safety
/// `adapter` must be a live handle; `pose` must point to a valid pose.
#[no_mangle]
pub unsafe extern "C" fn pb_adapter_on_device_pose_updated(
    adapter: *mut PbAdapter,
    pose: *const DriverPose,
) {
    if let (Some(adapter), Some(pose)) = (adapter.as_ref(), pose.as_ref()) {
        adapter.0.on_device_pose_updated(pose);
    }
}

/// Driver callback: the user toggled the device's orientation source.
///
/// # Safety
/// `adapter` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn pb_adapter_on_device_orientation_enabled(
    adapter: *mut PbAdapter,
    enable: bool,
) {
    if let Some(adapter) = adapter.as_ref() {
        adapter.0.on_device_orientation_enabled(enable);
    }
}

/// Driver callback: shutdown requested. Unblocks `pb_adapter_run`.
///
/// # Safety
/// `adapter` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn pb_adapter_on_quit(adapter: *mut PbAdapter) {
    if let Some(adapter) = adapter.as_ref() {
        adapter.0.on_quit();
    }
}

/// Destroy an adapter handle. Signals any pending quit signal first.
///
/// # Safety
/// `adapter` must be a handle from `pb_adapter_create`, not yet destroyed,
/// with no `pb_adapter_run` still blocked on it.
#[no_mangle]
pub unsafe extern "C" fn pb_adapter_destroy(adapter: *mut PbAdapter) {
    if !adapter.is_null() {
        drop(Box::from_raw(adapter));
    }
}

/// Message of the last error recorded by `pb_adapter_run`, or null.
/// The pointer stays valid until the next failing call.
#[no_mangle]
pub extern "C" fn pb_last_error_message() -> *const c_char {
    LAST_ERROR.as_ptr()
}
