//! Exercise a full bridge lifecycle against a synthetic tracking service.
//!
//! A stand-in driver thread feeds pose callbacks at ~30 Hz for a second,
//! then requests shutdown.
//!
//! Usage: cargo run --example run_bridge

use posebridge::{
    DriverConnection, DriverPose, HmdId, HmdPosition, Result, ServiceConfig, StreamFlags,
    TrackingAdapter, TrackingService,
};
use std::sync::Arc;
use std::time::Duration;

struct StdoutDriver;

impl DriverConnection for StdoutDriver {
    fn open(&mut self) -> Result<()> {
        println!("driver: connection open");
        Ok(())
    }

    fn close(&mut self) {
        println!("driver: connection closed");
    }

    fn set_tracking_enabled(&mut self, enabled: bool) {
        println!(
            "driver: external tracking {}",
            if enabled { "on" } else { "off" }
        );
    }

    fn set_device_orientation_enabled(&mut self, enabled: bool) {
        println!(
            "driver: device orientation {}",
            if enabled { "on" } else { "off" }
        );
    }

    fn publish_pose(&mut self, pose: &DriverPose) {
        println!(
            "pose: pos=[{:+.3}, {:+.3}, {:+.3}]  rot=[{:+.2}, {:+.2}, {:+.2}, {:+.2}]",
            pose.position[0],
            pose.position[1],
            pose.position[2],
            pose.rotation[0],
            pose.rotation[1],
            pose.rotation[2],
            pose.rotation[3],
        );
    }
}

/// Reports one HMD orbiting the origin at head height.
struct OrbitService {
    tick: u32,
}

impl TrackingService for OrbitService {
    fn initialize(&mut self, address: &str, port: u16, _timeout: Duration) -> Result<()> {
        println!("service: connected to {}:{}", address, port);
        Ok(())
    }

    fn shutdown(&mut self) {
        println!("service: shut down");
    }

    fn hmd_list(&mut self, _timeout: Duration) -> Result<Vec<HmdId>> {
        Ok(vec![HmdId(0)])
    }

    fn allocate_hmd_listener(&mut self, _hmd: HmdId) -> Result<()> {
        Ok(())
    }

    fn free_hmd_listener(&mut self, _hmd: HmdId) -> Result<()> {
        Ok(())
    }

    fn start_hmd_data_stream(
        &mut self,
        _hmd: HmdId,
        _flags: StreamFlags,
        _timeout: Duration,
    ) -> Result<()> {
        Ok(())
    }

    fn stop_hmd_data_stream(&mut self, _hmd: HmdId, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        self.tick += 1;
        Ok(())
    }

    fn hmd_position(&mut self, _hmd: HmdId) -> Result<HmdPosition> {
        // Centimeters, like the real service.
        let t = f64::from(self.tick) * 0.1;
        Ok(HmdPosition {
            x: (50.0 * t.cos()) as f32,
            y: 160.0,
            z: (50.0 * t.sin()) as f32,
        })
    }
}

fn main() {
    env_logger::init();

    let config = ServiceConfig {
        retry_delay: Duration::from_millis(100),
        ..ServiceConfig::default()
    };
    let adapter = Arc::new(TrackingAdapter::new(
        StdoutDriver,
        OrbitService { tick: 0 },
        config,
    ));

    // Stand-in for the driver's callback thread.
    let callbacks = {
        let adapter = adapter.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            adapter.on_device_orientation_enabled(false);
            for _ in 0..30 {
                adapter.on_device_pose_updated(&DriverPose::default());
                std::thread::sleep(Duration::from_millis(33));
            }
            adapter.on_quit();
        })
    };

    match adapter.run() {
        Ok(()) => println!("bridge exited cleanly"),
        Err(e) => eprintln!("bridge failed: {}", e),
    }

    callbacks.join().unwrap();
}
