mod common;

use std::time::Duration;
use tokio::time::{sleep, Instant};

use cardiac_zone::device::types::{DeviceRecord, ScanEvent};
use common::{addresses, controller, device, FakePlatform, TIMEOUT};

#[tokio::test(start_paused = true)]
async fn test_duplicates_ignored_and_scan_stops_after_timeout() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);
    let mut state = scan.subscribe();
    let started = Instant::now();

    scan.scan().await;
    assert!(scan.is_scanning());

    assert!(platform.discover("A"));
    assert!(platform.discover("B"));
    assert!(platform.discover("A"));
    state.wait_for(|state| state.devices.len() == 2).await.expect("scan state sender dropped");

    assert_eq!(addresses(&scan), vec!["A", "B"]);
    assert!(scan.is_scanning());

    sleep(Duration::from_millis(4900)).await;
    assert!(scan.is_scanning());

    state.wait_for(|state| !state.scanning).await.expect("scan state sender dropped");
    assert!(started.elapsed() >= TIMEOUT);
    assert_eq!(addresses(&scan), vec!["A", "B"]);
    assert_eq!(platform.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_seen_record_wins() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);
    let mut state = scan.subscribe();

    scan.scan().await;
    platform.discover("A");
    platform.emit(ScanEvent::Discovered(DeviceRecord::new("A", Some("renamed".to_string()), None)));
    platform.discover("B");
    state.wait_for(|state| state.devices.len() == 2).await.expect("scan state sender dropped");

    let devices = scan.state().devices();
    assert_eq!(devices[0], device("A"));
}

#[tokio::test(start_paused = true)]
async fn test_manual_stop_then_timeout_publishes_once() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);
    let mut state = scan.subscribe();

    scan.scan().await;
    platform.discover("A");
    state.wait_for(|state| state.devices.len() == 1).await.expect("scan state sender dropped");

    scan.stop_scan().await;
    assert!(!scan.is_scanning());
    assert!(state.has_changed().expect("scan state sender dropped"));
    state.borrow_and_update();

    // second manual stop
    scan.stop_scan().await;
    assert!(!scan.is_scanning());
    assert!(!state.has_changed().expect("scan state sender dropped"));

    // the timeout scheduled by scan() still fires, and has nothing to do
    sleep(TIMEOUT * 2).await;
    assert!(!scan.is_scanning());
    assert!(!state.has_changed().expect("scan state sender dropped"));
    assert_eq!(addresses(&scan), vec!["A"]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_after_timeout_is_harmless() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);
    let mut state = scan.subscribe();

    scan.scan().await;
    state.wait_for(|state| !state.scanning).await.expect("scan state sender dropped");
    state.borrow_and_update();

    scan.stop_scan().await;
    assert!(!scan.is_scanning());
    assert!(!state.has_changed().expect("scan state sender dropped"));
}

#[tokio::test(start_paused = true)]
async fn test_stop_when_never_started() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);
    let mut state = scan.subscribe();
    state.borrow_and_update();

    scan.stop_scan().await;
    assert!(!scan.is_scanning());
    assert!(!state.has_changed().expect("scan state sender dropped"));
}

#[tokio::test(start_paused = true)]
async fn test_rescan_starts_with_empty_registry() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);
    let mut state = scan.subscribe();

    scan.scan().await;
    platform.discover("A");
    platform.discover("B");
    state.wait_for(|state| state.devices.len() == 2).await.expect("scan state sender dropped");
    scan.stop_scan().await;

    // stopping keeps the devices
    assert_eq!(addresses(&scan), vec!["A", "B"]);

    scan.scan().await;
    let current = state.borrow_and_update().clone();
    assert!(current.scanning);
    assert!(current.devices.is_empty());

    platform.discover("B");
    state.wait_for(|state| state.devices.len() == 1).await.expect("scan state sender dropped");
    assert_eq!(addresses(&scan), vec!["B"]);
}

#[tokio::test(start_paused = true)]
async fn test_rescan_while_scanning_clears_registry() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);
    let mut state = scan.subscribe();

    scan.scan().await;
    platform.discover("A");
    state.wait_for(|state| state.devices.len() == 1).await.expect("scan state sender dropped");

    scan.scan().await;
    assert!(scan.is_scanning());
    assert!(addresses(&scan).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stale_timeout_does_not_stop_next_scan() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);

    scan.scan().await;
    sleep(Duration::from_secs(3)).await;
    scan.stop_scan().await;
    scan.scan().await;

    // first scan's timeout fires at 5s
    sleep(Duration::from_millis(2500)).await;
    assert!(scan.is_scanning());

    // second scan's timeout fires at 8s
    sleep(Duration::from_secs(3)).await;
    assert!(!scan.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn test_no_scan_without_permission() {
    let platform = FakePlatform::new();
    platform.deny_scan();
    let scan = controller(&platform);
    let mut state = scan.subscribe();
    state.borrow_and_update();

    scan.scan().await;

    assert!(!scan.is_scanning());
    assert_eq!(platform.starts(), 0);
    assert!(!state.has_changed().expect("scan state sender dropped"));
}

#[tokio::test(start_paused = true)]
async fn test_scan_failure_keeps_devices() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);
    let mut state = scan.subscribe();

    scan.scan().await;
    platform.discover("A");
    platform.emit(ScanEvent::Failed(2));
    state.wait_for(|state| !state.scanning).await.expect("scan state sender dropped");

    let current = scan.state();
    assert_eq!(current.last_failure, Some(2));
    assert_eq!(addresses(&scan), vec!["A"]);

    // no longer scanning, so late discoveries are dropped
    scan.on_device_discovered(device("B"));
    assert_eq!(addresses(&scan), vec!["A"]);
}

#[tokio::test(start_paused = true)]
async fn test_on_scan_failed() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);

    scan.scan().await;
    scan.on_device_discovered(device("A"));
    scan.on_scan_failed(5);

    assert!(!scan.is_scanning());
    assert_eq!(scan.state().last_failure, Some(5));
    assert_eq!(addresses(&scan), vec!["A"]);

    // the next scan clears the diagnostic
    scan.scan().await;
    assert_eq!(scan.state().last_failure, None);
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_stops_scanning() {
    let platform = FakePlatform::new();
    platform.fail_start(3);
    let scan = controller(&platform);

    scan.scan().await;

    assert!(!scan.is_scanning());
    assert_eq!(scan.state().last_failure, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_stop_tolerates_revoked_capability() {
    let platform = FakePlatform::new();
    platform.revoke_on_stop();
    let scan = controller(&platform);

    scan.scan().await;
    scan.stop_scan().await;
    assert!(!scan.is_scanning());

    scan.stop_scan().await;
    assert!(!scan.is_scanning());
    assert_eq!(platform.stops(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rescan_during_slow_stop_keeps_new_scan() {
    let platform = FakePlatform::new();
    platform.slow_stop(Duration::from_millis(500));
    let scan = controller(&platform);
    let mut state = scan.subscribe();

    let stopping = tokio::spawn({
        let scan = scan.clone();
        async move { scan.stop_scan().await }
    });
    while platform.stops() == 0 {
        tokio::task::yield_now().await;
    }

    // the platform is still busy stopping when the user rescans
    scan.scan().await;
    stopping.await.expect("stop task panicked");

    assert!(scan.is_scanning());
    assert!(platform.discover("A"));
    state.wait_for(|state| state.devices.len() == 1).await.expect("scan state sender dropped");

    // the new scan still ends on its own timeout, and the platform is told to stop
    state.wait_for(|state| !state.scanning).await.expect("scan state sender dropped");
    assert_eq!(platform.stops(), 2);
    assert!(!platform.discover("B"));
    assert_eq!(addresses(&scan), vec!["A"]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_during_slow_stop_is_harmless() {
    let platform = FakePlatform::new();
    platform.slow_stop(Duration::from_secs(1));
    let scan = controller(&platform);

    scan.scan().await;
    sleep(Duration::from_millis(4500)).await;

    // manual stop still in flight when the timeout fires
    let stopping = tokio::spawn({
        let scan = scan.clone();
        async move { scan.stop_scan().await }
    });
    stopping.await.expect("stop task panicked");

    assert!(!scan.is_scanning());
    assert_eq!(platform.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scan_does_not_need_connect_permission() {
    let platform = FakePlatform::new();
    platform.deny_connect();
    let scan = controller(&platform);

    scan.scan().await;
    assert!(scan.is_scanning());
    assert_eq!(platform.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_discoveries_after_stop_are_ignored() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);

    scan.scan().await;
    scan.on_device_discovered(device("A"));
    scan.stop_scan().await;
    scan.on_device_discovered(device("B"));

    assert_eq!(addresses(&scan), vec!["A"]);
    // the platform stream of the stopped scan is closed
    assert!(!platform.discover("C"));
}

#[tokio::test(start_paused = true)]
async fn test_late_subscriber_gets_current_state() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);

    scan.scan().await;
    scan.on_device_discovered(device("A"));

    let late = scan.subscribe();
    let current = late.borrow().clone();
    assert!(current.scanning);
    assert_eq!(current.devices(), vec![device("A")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_discoveries_never_duplicate() {
    let platform = FakePlatform::new();
    let scan = controller(&platform);
    scan.scan().await;

    let mut handles = Vec::new();
    for task in 0..8 {
        let scan = scan.clone();
        handles.push(tokio::spawn(async move {
            for index in 0..20 {
                // every task reports the same devices, in a different order
                let address = format!("00:00:00:00:00:{:02X}", (index + task * 3) % 20);
                scan.on_device_discovered(device(&address));
            }
        }));
    }
    for handle in handles {
        handle.await.expect("discovery task panicked");
    }

    let found = addresses(&scan);
    assert_eq!(found.len(), 20);

    let mut unique = found.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 20);
}
