use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use futures::StreamExt;
use futures::stream::BoxStream;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::device::platform::BlePlatform;
use crate::device::types::{DeviceRecord, Permission, ScanEvent, ScanState};
use crate::error::DeviceError;

// the scan currently feeding the registry
struct Session {
    generation: u64,
    cancel: CancellationToken,
}

struct ScanControllerInner {
    platform: Arc<dyn BlePlatform>,
    timeout: Duration,
    // every write to the scan state goes through this sender
    state: watch::Sender<ScanState>,
    session: Mutex<Option<Session>>,
}

/// Owns the scan lifecycle and the registry of devices found by the current scan.
///
/// Cloning is cheap, all clones drive the same scan. Observers get the latest
/// `ScanState` immediately from `subscribe()` and every change after that.
#[derive(Clone)]
pub struct ScanController {
    inner: Arc<ScanControllerInner>,
}

impl ScanController {
    pub fn new(platform: Arc<dyn BlePlatform>, timeout: Duration) -> Self {
        let (state, _) = watch::channel(ScanState::default());

        ScanController {
            inner: Arc::new(ScanControllerInner {
                platform,
                timeout,
                state,
                session: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> ScanState {
        self.inner.state.borrow().clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.state.borrow().scanning
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.inner.session.lock().expect("Failed to lock scan session")
    }

    // Returns true if a session was cancelled.
    fn cancel_session(&self, generation: Option<u64>) -> bool {
        let mut session = self.lock_session();
        let matches = match (session.as_ref(), generation) {
            (Some(current), Some(generation)) => current.generation == generation,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if !matches {
            return false;
        }

        match session.take() {
            Some(current) => {
                current.cancel.cancel();
                true
            },
            None => false,
        }
    }

    /// Starts a new scan, discarding the devices of any previous scan.
    ///
    /// Does nothing if the scan permission has not been granted; requesting
    /// it is up to the caller. The scan stops by itself after the configured
    /// timeout.
    pub async fn scan(&self) {
        if !self.inner.platform.has_permission(Permission::Scan).await {
            info!("Bluetooth scan permission not granted; not scanning");
            return;
        }

        let mut generation = 0;
        self.inner.state.send_modify(|state| {
            state.generation += 1;
            generation = state.generation;
            state.devices.clear();
            state.scanning = true;
            state.last_failure = None;
        });

        let cancel = CancellationToken::new();
        if let Some(previous) = self.lock_session().replace(Session { generation, cancel: cancel.clone() }) {
            previous.cancel.cancel();
        }

        info!("Scanning for {:?}...", self.inner.timeout);

        match self.inner.platform.start_scan().await {
            Ok(events) => {
                spawn(pump_events(self.clone(), generation, cancel, events));
            },
            Err(err) => {
                warn!("Starting scan failed: {}", err);
                let code = match err {
                    DeviceError::ScanFailed { code } => Some(code),
                    _ => None,
                };
                self.fail(Some(generation), code);
                return;
            },
        }

        // one-shot, outlives manual stops and rescans; only acts while its scan owns the session
        let controller = self.clone();
        let timeout = self.inner.timeout;
        spawn(async move {
            sleep(timeout).await;
            controller.stop_scan_generation(generation).await;
        });
    }

    /// Stops the current scan. Safe to call at any time, including when no
    /// scan is running. Platform errors are logged and otherwise ignored.
    ///
    /// A scan started while the platform is still stopping is left running.
    pub async fn stop_scan(&self) {
        let generation = self.inner.state.borrow().generation;
        self.cancel_session(Some(generation));

        if let Err(err) = self.inner.platform.stop_scan().await {
            warn!("Failed to stop scan: {}", err);
        }

        self.mark_stopped(generation);
    }

    async fn stop_scan_generation(&self, generation: u64) {
        // whoever took the session over has stopped this scan already
        if !self.cancel_session(Some(generation)) {
            debug!("Scan timeout for scan {} has nothing to stop", generation);
            return;
        }

        info!("Scan timeout reached");

        if let Err(err) = self.inner.platform.stop_scan().await {
            warn!("Failed to stop scan: {}", err);
        }

        self.mark_stopped(generation);
    }

    fn mark_stopped(&self, generation: u64) {
        let mut found = 0;
        let stopped = self.inner.state.send_if_modified(|state| {
            if !state.scanning || state.generation != generation {
                return false;
            }

            state.scanning = false;
            found = state.devices.len();
            true
        });

        if stopped {
            info!("Scan stopped; {} device(s) found", found);
        }
    }

    /// Records a discovered device. Duplicate addresses and discoveries that
    /// arrive while not scanning are ignored.
    pub fn on_device_discovered(&self, record: DeviceRecord) {
        self.insert(None, record);
    }

    /// The platform reported that the scan failed. The devices found so far
    /// are kept; the code is only retained for diagnostics.
    pub fn on_scan_failed(&self, code: i32) {
        self.fail(None, Some(code));
    }

    fn insert(&self, generation: Option<u64>, record: DeviceRecord) {
        self.inner.state.send_if_modified(|state| {
            if !state.scanning || generation.is_some_and(|generation| generation != state.generation) {
                return false;
            }

            let address = record.address.clone();
            let inserted = state.devices.insert(record);
            if inserted {
                debug!("Discovered device {}", address);
            }
            inserted
        });
    }

    fn fail(&self, generation: Option<u64>, code: Option<i32>) {
        if let Some(code) = code {
            warn!("Scan failed with platform error code {}", code);
        }

        self.cancel_session(generation);

        self.inner.state.send_if_modified(|state| {
            if generation.is_some_and(|generation| generation != state.generation) {
                return false;
            }

            let modified = state.scanning || (code.is_some() && state.last_failure != code);
            state.scanning = false;
            if code.is_some() {
                state.last_failure = code;
            }
            modified
        });
    }

    fn apply(&self, generation: u64, event: ScanEvent) {
        match event {
            ScanEvent::Discovered(record) => self.insert(Some(generation), record),
            ScanEvent::Failed(code) => self.fail(Some(generation), Some(code)),
        }
    }
}

async fn pump_events(
    controller: ScanController,
    generation: u64,
    cancel: CancellationToken,
    mut events: BoxStream<'static, ScanEvent>,
) {
    'mainloop: loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break 'mainloop;
            },
            event = events.next() => {
                match event {
                    Some(event) => controller.apply(generation, event),
                    None => break 'mainloop,
                }
            },
        }
    }

    debug!("Discovery events of scan {} no longer consumed", generation);
}
