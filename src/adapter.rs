use crate::config::ServiceConfig;
use crate::driver::DriverConnection;
use crate::service::TrackingService;
use crate::signal::QuitSignal;
use crate::types::{
    DriverPose, HmdId, StreamFlags, CENTIMETERS_TO_METERS, DEFAULT_POSITION, IDENTITY_ROTATION,
};
use crate::{BridgeError, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared tracking state written by the callbacks and read on every pose
/// update.
struct Tracking {
    /// Latest HMD position in meters.
    position: [f64; 3],
    /// When false, published poses get the identity rotation.
    use_device_orientation: bool,
}

/// Snapshot of the tracking-service session: whether init fully succeeded
/// and which HMDs the service listed at that point.
struct Session {
    ready: bool,
    hmds: Vec<HmdId>,
}

impl Session {
    /// Only the first listed HMD is ever consulted; multi-device setups
    /// are not supported.
    fn primary_hmd(&self) -> Option<HmdId> {
        self.hmds.first().copied()
    }
}

/// A poisoned lock means a callback panicked; the state itself is plain
/// data, so keep going with it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bridges an external positional-tracking service into the host driver's
/// pose pipeline.
///
/// [`run`](Self::run) drives the lifecycle on its own thread and blocks
/// until [`on_quit`](Self::on_quit); the `on_*` callbacks are invoked by
/// the driver from its callback thread. All shared state lives behind
/// mutexes, so the adapter can be held in an `Arc` across both threads.
pub struct TrackingAdapter<D, S> {
    driver: Mutex<D>,
    service: Mutex<S>,
    config: ServiceConfig,
    tracking: Mutex<Tracking>,
    session: Mutex<Session>,
    quit: Mutex<Option<Arc<QuitSignal>>>,
}

impl<D: DriverConnection, S: TrackingService> TrackingAdapter<D, S> {
    pub fn new(driver: D, service: S, config: ServiceConfig) -> Self {
        Self {
            driver: Mutex::new(driver),
            service: Mutex::new(service),
            config,
            tracking: Mutex::new(Tracking {
                position: DEFAULT_POSITION,
                use_device_orientation: true,
            }),
            session: Mutex::new(Session {
                ready: false,
                hmds: Vec::new(),
            }),
            quit: Mutex::new(None),
        }
    }

    /// Run the bridge until [`on_quit`](Self::on_quit) fires.
    ///
    /// Opens the driver connection, initializes the tracking service with a
    /// bounded best-effort retry loop, hands the driver's tracking source
    /// over to the bridge, and blocks on the quit signal. On wake the
    /// original tracking source is restored and the connection closed.
    ///
    /// Service init failure is not fatal: the run proceeds and poses carry
    /// the last known (initially default) position. A second `run()` on the
    /// same instance fails with [`BridgeError::AlreadyRan`].
    pub fn run(&self) -> Result<()> {
        lock(&self.driver).open()?;

        let quit = Arc::new(QuitSignal::new());
        {
            let mut slot = lock(&self.quit);
            if slot.is_some() {
                lock(&self.driver).close();
                return Err(BridgeError::AlreadyRan);
            }
            *slot = Some(quit.clone());
        }

        // NOTE: in an external tracking process the source handover below
        // would normally wait until tracking has actually begun, so the
        // device is never left with no active source.
        for attempt in 1..=self.config.max_attempts {
            if lock(&self.session).ready {
                break;
            }
            log::info!(
                "Initializing tracking service (attempt {}/{})",
                attempt,
                self.config.max_attempts
            );
            self.init_service();
            if !lock(&self.session).ready && attempt < self.config.max_attempts {
                std::thread::sleep(self.config.retry_delay);
            }
        }
        if !lock(&self.session).ready {
            log::warn!("Tracking service unavailable, publishing last known position");
        }

        {
            let mut driver = lock(&self.driver);
            driver.set_device_orientation_enabled(false);
            driver.set_tracking_enabled(true);
        }

        quit.wait();

        {
            let mut driver = lock(&self.driver);
            driver.set_tracking_enabled(false);
            driver.set_device_orientation_enabled(true);
            driver.close();
        }

        Ok(())
    }

    /// Driver callback: a pose is about to be published.
    ///
    /// Pulls a fresh service update when the session is ready, then hands
    /// the pose back with position (and, while the orientation override is
    /// active, rotation) substituted.
    pub fn on_device_pose_updated(&self, pose: &DriverPose) {
        let mut tracking = lock(&self.tracking);

        let (ready, hmd) = {
            let session = lock(&self.session);
            (session.ready, session.primary_hmd())
        };
        if ready {
            let mut service = lock(&self.service);
            if let Err(e) = service.update() {
                log::warn!("Tracking service update failed: {}", e);
            }
            if let Some(hmd) = hmd {
                match service.hmd_position(hmd) {
                    Ok(sample) => {
                        tracking.position = [
                            f64::from(sample.x) * CENTIMETERS_TO_METERS,
                            f64::from(sample.y) * CENTIMETERS_TO_METERS,
                            f64::from(sample.z) * CENTIMETERS_TO_METERS,
                        ];
                    }
                    Err(e) => log::warn!("Failed to read HMD position: {}", e),
                }
            }
        }

        let mut updated = *pose;
        if !tracking.use_device_orientation {
            updated.rotation = IDENTITY_ROTATION;
        }
        updated.position = tracking.position;
        drop(tracking);

        lock(&self.driver).publish_pose(&updated);
    }

    /// Driver callback: the user toggled the device's orientation source.
    pub fn on_device_orientation_enabled(&self, enable: bool) {
        lock(&self.tracking).use_device_orientation = enable;
    }

    /// Driver callback: the driver wants the bridge to shut down.
    ///
    /// Tears the service session down and fires the quit signal so a
    /// blocked [`run`](Self::run) can exit. A no-op (besides the log line)
    /// when `run` never got as far as creating the signal.
    pub fn on_quit(&self) {
        let quit = lock(&self.quit).clone();
        if let Some(quit) = quit {
            {
                let session = lock(&self.session);
                let mut service = lock(&self.service);
                if let Some(hmd) = session.primary_hmd() {
                    if let Err(e) = service.stop_hmd_data_stream(hmd, self.config.timeout) {
                        log::warn!("Failed to stop HMD data stream: {}", e);
                    }
                    if let Err(e) = service.free_hmd_listener(hmd) {
                        log::warn!("Failed to free HMD listener: {}", e);
                    }
                }
                service.shutdown();
            }
            quit.signal();
        }

        log::info!("Shutting down");
    }

    /// One tracking-service init attempt.
    ///
    /// On success the HMD list snapshot is refreshed and, if an HMD is
    /// listed, a listener is allocated and a position-only stream started.
    /// Sub-step failures log and clear the ready flag without rolling back
    /// the steps that already completed.
    fn init_service(&self) {
        let mut session = lock(&self.session);
        let mut service = lock(&self.service);

        session.ready = true;
        if let Err(e) = service.initialize(&self.config.address, self.config.port, self.config.timeout)
        {
            log::error!("Failed to initialize the tracking service client: {}", e);
            session.ready = false;
            return;
        }

        session.hmds.clear();
        match service.hmd_list(self.config.timeout) {
            Ok(hmds) => session.hmds = hmds,
            Err(e) => log::warn!("Failed to query HMD list: {}", e),
        }

        if let Some(hmd) = session.primary_hmd() {
            if let Err(e) = service.allocate_hmd_listener(hmd) {
                log::error!("Failed to allocate HMD listener: {}", e);
                session.ready = false;
            }
            if let Err(e) =
                service.start_hmd_data_stream(hmd, StreamFlags::INCLUDE_POSITION, self.config.timeout)
            {
                log::error!("Failed to start HMD data stream: {}", e);
                session.ready = false;
            }
        }
    }
}

impl<D, S> Drop for TrackingAdapter<D, S> {
    fn drop(&mut self) {
        // Leave no waiter dangling on a signal we are about to release.
        if let Some(quit) = lock(&self.quit).take() {
            quit.signal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HmdPosition;
    use crossbeam_channel::{bounded, Receiver, Sender};
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum DriverEvent {
        Open,
        Close,
        Tracking(bool),
        DeviceOrientation(bool),
    }

    #[derive(Default)]
    struct DriverLog {
        events: Vec<DriverEvent>,
        published: Vec<DriverPose>,
    }

    struct MockDriver {
        log: Arc<Mutex<DriverLog>>,
        fail_open: Option<i32>,
        // Fired when external tracking is switched on, so tests can
        // rendezvous with a run() on another thread.
        tracking_on: Option<Sender<()>>,
    }

    impl MockDriver {
        fn new() -> (Self, Arc<Mutex<DriverLog>>) {
            let log = Arc::new(Mutex::new(DriverLog::default()));
            (
                Self {
                    log: log.clone(),
                    fail_open: None,
                    tracking_on: None,
                },
                log,
            )
        }

        fn with_tracking_notify() -> (Self, Arc<Mutex<DriverLog>>, Receiver<()>) {
            let (driver, log) = Self::new();
            let (tx, rx) = bounded(1);
            (
                Self {
                    tracking_on: Some(tx),
                    ..driver
                },
                log,
                rx,
            )
        }
    }

    impl DriverConnection for MockDriver {
        fn open(&mut self) -> Result<()> {
            if let Some(code) = self.fail_open {
                return Err(BridgeError::Driver(code));
            }
            lock(&self.log).events.push(DriverEvent::Open);
            Ok(())
        }

        fn close(&mut self) {
            lock(&self.log).events.push(DriverEvent::Close);
        }

        fn set_tracking_enabled(&mut self, enabled: bool) {
            lock(&self.log).events.push(DriverEvent::Tracking(enabled));
            if enabled {
                if let Some(tx) = &self.tracking_on {
                    let _ = tx.try_send(());
                }
            }
        }

        fn set_device_orientation_enabled(&mut self, enabled: bool) {
            lock(&self.log)
                .events
                .push(DriverEvent::DeviceOrientation(enabled));
        }

        fn publish_pose(&mut self, pose: &DriverPose) {
            lock(&self.log).published.push(*pose);
        }
    }

    #[derive(Default)]
    struct ServiceCalls {
        initialize: u32,
        shutdown: u32,
        allocate: u32,
        free: u32,
        start_stream: u32,
        stop_stream: u32,
        update: u32,
    }

    struct MockService {
        calls: Arc<Mutex<ServiceCalls>>,
        hmds: Vec<HmdId>,
        position: HmdPosition,
        fail_initialize: bool,
        fail_allocate: bool,
    }

    impl MockService {
        fn new(hmds: Vec<HmdId>) -> (Self, Arc<Mutex<ServiceCalls>>) {
            let calls = Arc::new(Mutex::new(ServiceCalls::default()));
            (
                Self {
                    calls: calls.clone(),
                    hmds,
                    position: HmdPosition::default(),
                    fail_initialize: false,
                    fail_allocate: false,
                },
                calls,
            )
        }
    }

    impl TrackingService for MockService {
        fn initialize(&mut self, _address: &str, _port: u16, _timeout: Duration) -> Result<()> {
            lock(&self.calls).initialize += 1;
            if self.fail_initialize {
                return Err(BridgeError::Service("connection refused".into()));
            }
            Ok(())
        }

        fn shutdown(&mut self) {
            lock(&self.calls).shutdown += 1;
        }

        fn hmd_list(&mut self, _timeout: Duration) -> Result<Vec<HmdId>> {
            Ok(self.hmds.clone())
        }

        fn allocate_hmd_listener(&mut self, _hmd: HmdId) -> Result<()> {
            lock(&self.calls).allocate += 1;
            if self.fail_allocate {
                return Err(BridgeError::Service("listener slot exhausted".into()));
            }
            Ok(())
        }

        fn free_hmd_listener(&mut self, _hmd: HmdId) -> Result<()> {
            lock(&self.calls).free += 1;
            Ok(())
        }

        fn start_hmd_data_stream(
            &mut self,
            _hmd: HmdId,
            flags: StreamFlags,
            _timeout: Duration,
        ) -> Result<()> {
            assert!(flags.contains(StreamFlags::INCLUDE_POSITION));
            lock(&self.calls).start_stream += 1;
            Ok(())
        }

        fn stop_hmd_data_stream(&mut self, _hmd: HmdId, _timeout: Duration) -> Result<()> {
            lock(&self.calls).stop_stream += 1;
            Ok(())
        }

        fn update(&mut self) -> Result<()> {
            lock(&self.calls).update += 1;
            Ok(())
        }

        fn hmd_position(&mut self, _hmd: HmdId) -> Result<HmdPosition> {
            Ok(self.position)
        }
    }

    fn test_config() -> ServiceConfig {
        ServiceConfig {
            max_attempts: 3,
            retry_delay: Duration::ZERO,
            ..ServiceConfig::default()
        }
    }

    fn input_pose() -> DriverPose {
        DriverPose {
            position: [9.0, 9.0, 9.0],
            rotation: [0.5, 0.5, 0.5, 0.5],
            ..DriverPose::default()
        }
    }

    #[test]
    fn test_orientation_override_forces_identity() {
        let (driver, log) = MockDriver::new();
        let (service, _) = MockService::new(vec![]);
        let adapter = TrackingAdapter::new(driver, service, test_config());

        adapter.on_device_orientation_enabled(false);
        adapter.on_device_pose_updated(&input_pose());

        let published = lock(&log).published[0];
        assert_eq!(published.rotation, IDENTITY_ROTATION);
    }

    #[test]
    fn test_orientation_passthrough_when_enabled() {
        let (driver, log) = MockDriver::new();
        let (service, _) = MockService::new(vec![]);
        let adapter = TrackingAdapter::new(driver, service, test_config());

        adapter.on_device_orientation_enabled(true);
        adapter.on_device_pose_updated(&input_pose());

        let published = lock(&log).published[0];
        assert_eq!(published.rotation, [0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_position_defaults_without_session() {
        let (driver, log) = MockDriver::new();
        let (service, calls) = MockService::new(vec![HmdId(0)]);
        let adapter = TrackingAdapter::new(driver, service, test_config());

        adapter.on_device_pose_updated(&input_pose());

        let published = lock(&log).published[0];
        assert_eq!(published.position, DEFAULT_POSITION);
        assert_eq!(lock(&calls).update, 0);
    }

    #[test]
    fn test_centimeters_to_meters() {
        let (driver, log) = MockDriver::new();
        let (mut service, _) = MockService::new(vec![HmdId(0)]);
        service.position = HmdPosition {
            x: 100.0,
            y: 200.0,
            z: 300.0,
        };
        let adapter = TrackingAdapter::new(driver, service, test_config());
        adapter.init_service();

        adapter.on_device_pose_updated(&input_pose());

        let published = lock(&log).published[0];
        for (got, want) in published.position.iter().zip([1.0, 2.0, 3.0]) {
            assert!((got - want).abs() < 1e-9, "got {:?}", published.position);
        }
    }

    #[test]
    fn test_pass_through_fields_survive() {
        let (driver, log) = MockDriver::new();
        let (service, _) = MockService::new(vec![]);
        let adapter = TrackingAdapter::new(driver, service, test_config());

        let mut pose = input_pose();
        pose.velocity = [0.1, 0.2, 0.3];
        adapter.on_device_pose_updated(&pose);

        let published = lock(&log).published[0];
        assert_eq!(published.velocity, [0.1, 0.2, 0.3]);
        assert!(published.pose_is_valid);
    }

    #[test]
    fn test_run_open_failure_returns_driver_code() {
        let (mut driver, log) = MockDriver::new();
        driver.fail_open = Some(13);
        let (service, calls) = MockService::new(vec![HmdId(0)]);
        let adapter = TrackingAdapter::new(driver, service, test_config());

        match adapter.run() {
            Err(BridgeError::Driver(code)) => assert_eq!(code, 13),
            other => panic!("expected driver error, got {:?}", other.err()),
        }
        // No quit signal, no service init, no toggles.
        assert!(lock(&adapter.quit).is_none());
        assert_eq!(lock(&calls).initialize, 0);
        assert!(lock(&log).events.is_empty());
    }

    #[test]
    fn test_quit_before_run_logs_only() {
        let (driver, _) = MockDriver::new();
        let (service, calls) = MockService::new(vec![HmdId(0)]);
        let adapter = TrackingAdapter::new(driver, service, test_config());

        adapter.on_quit();

        let calls = lock(&calls);
        assert_eq!(calls.stop_stream, 0);
        assert_eq!(calls.free, 0);
        assert_eq!(calls.shutdown, 0);
    }

    #[test]
    fn test_run_lifecycle_and_quit_teardown() {
        let (driver, log, tracking_on) = MockDriver::with_tracking_notify();
        let (service, calls) = MockService::new(vec![HmdId(0)]);
        let adapter = Arc::new(TrackingAdapter::new(driver, service, test_config()));

        let runner = {
            let adapter = adapter.clone();
            std::thread::spawn(move || adapter.run())
        };
        tracking_on
            .recv_timeout(Duration::from_secs(5))
            .expect("run() never enabled tracking");

        adapter.on_quit();
        runner.join().unwrap().unwrap();

        assert_eq!(
            lock(&log).events,
            vec![
                DriverEvent::Open,
                DriverEvent::DeviceOrientation(false),
                DriverEvent::Tracking(true),
                DriverEvent::Tracking(false),
                DriverEvent::DeviceOrientation(true),
                DriverEvent::Close,
            ]
        );
        let calls = lock(&calls);
        assert_eq!(calls.initialize, 1);
        assert_eq!(calls.allocate, 1);
        assert_eq!(calls.start_stream, 1);
        assert_eq!(calls.stop_stream, 1);
        assert_eq!(calls.free, 1);
        assert_eq!(calls.shutdown, 1);
    }

    #[test]
    fn test_second_run_fails() {
        let (driver, _, tracking_on) = MockDriver::with_tracking_notify();
        let (service, _) = MockService::new(vec![]);
        let adapter = Arc::new(TrackingAdapter::new(driver, service, test_config()));

        let runner = {
            let adapter = adapter.clone();
            std::thread::spawn(move || adapter.run())
        };
        tracking_on
            .recv_timeout(Duration::from_secs(5))
            .expect("run() never enabled tracking");
        adapter.on_quit();
        runner.join().unwrap().unwrap();

        assert!(matches!(adapter.run(), Err(BridgeError::AlreadyRan)));
    }

    #[test]
    fn test_init_retry_exhaustion_is_nonfatal() {
        let (driver, _, tracking_on) = MockDriver::with_tracking_notify();
        let (mut service, calls) = MockService::new(vec![HmdId(0)]);
        service.fail_initialize = true;
        let adapter = Arc::new(TrackingAdapter::new(driver, service, test_config()));

        let runner = {
            let adapter = adapter.clone();
            std::thread::spawn(move || adapter.run())
        };
        tracking_on
            .recv_timeout(Duration::from_secs(5))
            .expect("run() never enabled tracking");
        adapter.on_quit();
        runner.join().unwrap().unwrap();

        assert_eq!(lock(&calls).initialize, 3);
        assert!(!lock(&adapter.session).ready);
    }

    #[test]
    fn test_partial_init_failure_keeps_going() {
        let (driver, _) = MockDriver::new();
        let (mut service, calls) = MockService::new(vec![HmdId(0)]);
        service.fail_allocate = true;
        let adapter = TrackingAdapter::new(driver, service, test_config());

        adapter.init_service();

        // Stream start is still attempted; no rollback of completed steps.
        let calls = lock(&calls);
        assert_eq!(calls.allocate, 1);
        assert_eq!(calls.start_stream, 1);
        assert!(!lock(&adapter.session).ready);
    }

    #[test]
    fn test_drop_signals_pending_quit() {
        let (driver, _) = MockDriver::new();
        let (service, _) = MockService::new(vec![]);
        let adapter = TrackingAdapter::new(driver, service, test_config());

        let quit = Arc::new(QuitSignal::new());
        *lock(&adapter.quit) = Some(quit.clone());

        drop(adapter);
        assert!(quit.is_signaled());
    }
}
