//! A scriptable stand-in for the platform BLE stack.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;

use cardiac_zone::device::platform::BlePlatform;
use cardiac_zone::device::scan::ScanController;
use cardiac_zone::device::types::{DeviceRecord, Permission, ScanEvent};
use cardiac_zone::error::DeviceError;

pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct FakePlatform {
    deny_scan: AtomicBool,
    deny_connect: AtomicBool,
    // stop_scan reports that the capability was revoked
    revoke_on_stop: AtomicBool,
    start_failure: Mutex<Option<i32>>,
    // how long the platform takes to stop a scan
    stop_delay: Mutex<Option<Duration>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    events: Mutex<Option<UnboundedSender<ScanEvent>>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(FakePlatform::default())
    }

    pub fn deny_scan(&self) {
        self.deny_scan.store(true, Ordering::SeqCst);
    }

    pub fn deny_connect(&self) {
        self.deny_connect.store(true, Ordering::SeqCst);
    }

    pub fn slow_stop(&self, delay: Duration) {
        *self.stop_delay.lock().unwrap() = Some(delay);
    }

    pub fn revoke_on_stop(&self) {
        self.revoke_on_stop.store(true, Ordering::SeqCst);
    }

    pub fn fail_start(&self, code: i32) {
        *self.start_failure.lock().unwrap() = Some(code);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Delivers an event on the stream of the running scan. Returns false if no scan is running.
    pub fn emit(&self, event: ScanEvent) -> bool {
        match self.events.lock().unwrap().as_ref() {
            Some(sender) => sender.unbounded_send(event).is_ok(),
            None => false,
        }
    }

    pub fn discover(&self, address: &str) -> bool {
        self.emit(ScanEvent::Discovered(device(address)))
    }
}

#[async_trait]
impl BlePlatform for FakePlatform {
    async fn has_permission(&self, permission: Permission) -> bool {
        match permission {
            Permission::Scan => !self.deny_scan.load(Ordering::SeqCst),
            Permission::Connect => !self.deny_connect.load(Ordering::SeqCst),
        }
    }

    async fn start_scan(&self) -> Result<BoxStream<'static, ScanEvent>, DeviceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);

        if let Some(code) = *self.start_failure.lock().unwrap() {
            return Err(DeviceError::ScanFailed { code });
        }

        let (sender, receiver) = unbounded();
        *self.events.lock().unwrap() = Some(sender);
        Ok(receiver.boxed())
    }

    async fn stop_scan(&self) -> Result<(), DeviceError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().take();

        let delay = *self.stop_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.revoke_on_stop.load(Ordering::SeqCst) {
            return Err(DeviceError::PermissionDenied);
        }
        Ok(())
    }
}

pub fn device(address: &str) -> DeviceRecord {
    DeviceRecord::new(address, Some(format!("HRM {}", address)), Some(-60))
}

pub fn controller(platform: &Arc<FakePlatform>) -> ScanController {
    ScanController::new(platform.clone(), TIMEOUT)
}

pub fn addresses(controller: &ScanController) -> Vec<String> {
    controller.state().devices().into_iter().map(|device| device.address).collect()
}
