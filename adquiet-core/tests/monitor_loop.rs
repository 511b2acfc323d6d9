mod common;

use std::sync::{atomic::Ordering, Arc};
use std::time::Duration;

use adquiet_core::error::Result;
use adquiet_core::{
    AnalyzerSession, FixedPreferences, Monitor, MonitorConfig, MonitorStatus, VolumeControl,
};
use common::{bright_loud_block, silent_block, Calls, Script, ScriptedBackend};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::TryRecvError;

struct FakeVolume {
    level: Mutex<u32>,
    max: u32,
    sets: Mutex<Vec<u32>>,
}

impl FakeVolume {
    fn new(level: u32, max: u32) -> Arc<Self> {
        Arc::new(Self {
            level: Mutex::new(level),
            max,
            sets: Mutex::new(Vec::new()),
        })
    }
}

impl VolumeControl for FakeVolume {
    fn current(&self) -> Result<u32> {
        Ok(*self.level.lock())
    }

    fn max(&self) -> Result<u32> {
        Ok(self.max)
    }

    fn set(&self, level: u32) -> Result<()> {
        *self.level.lock() = level;
        self.sets.lock().push(level);
        Ok(())
    }
}

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        interval: Duration::from_millis(10),
    }
}

fn ready_session(script: Script) -> (Arc<AnalyzerSession<ScriptedBackend>>, Arc<Calls>) {
    let (backend, calls, _) = ScriptedBackend::new(script);
    let session = AnalyzerSession::new(backend).expect("create session");
    session.initialize().expect("initialize session");
    (Arc::new(session), calls)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn positive_detection_reduces_volume() {
    let (session, _) = ready_session(Script::block(bright_loud_block()));
    let volume = FakeVolume::new(80, 100);
    let prefs = FixedPreferences {
        sensitivity: 50,
        enabled: true,
    };

    let monitor = Monitor::new(fast_config());
    let mut detections = monitor.subscribe_detections();
    let handle = monitor.spawn(session, Arc::new(prefs), volume.clone());

    let event = tokio::time::timeout(Duration::from_secs(2), detections.recv())
        .await
        .expect("detection within timeout")
        .expect("detection channel open");
    handle.stop().await;

    assert_eq!(event.seq, 1);
    assert!(event.is_advertisement);
    assert!(event.volume_reduced);
    assert_eq!(event.threshold, 50);
    assert_eq!(volume.sets.lock().first().copied(), Some(40));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn negative_detection_leaves_volume_alone() {
    let (session, calls) = ready_session(Script::block(silent_block()));
    let volume = FakeVolume::new(80, 100);

    let monitor = Monitor::new(fast_config());
    let mut detections = monitor.subscribe_detections();
    let handle = monitor.spawn(session, Arc::new(FixedPreferences::default()), volume.clone());

    for expected_seq in 1..=3 {
        let event = tokio::time::timeout(Duration::from_secs(2), detections.recv())
            .await
            .expect("detection within timeout")
            .expect("detection channel open");
        assert_eq!(event.seq, expected_seq);
        assert!(!event.is_advertisement);
        assert!(!event.volume_reduced);
    }
    handle.stop().await;

    assert!(volume.sets.lock().is_empty());
    assert_eq!(*volume.level.lock(), 80);
    assert!(Calls::count(&calls.starts) >= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disabled_preferences_skip_analysis() {
    let (session, calls) = ready_session(Script::block(bright_loud_block()));
    let volume = FakeVolume::new(80, 100);
    let prefs = FixedPreferences {
        sensitivity: 10,
        enabled: false,
    };

    let monitor = Monitor::new(fast_config());
    let mut detections = monitor.subscribe_detections();
    let handle = monitor.spawn(session, Arc::new(prefs), volume.clone());

    tokio::time::sleep(Duration::from_millis(60)).await;
    handle.stop().await;

    assert!(matches!(detections.try_recv(), Err(TryRecvError::Closed)));
    assert_eq!(Calls::count(&calls.starts), 0);
    assert!(volume.sets.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_interrupts_a_slow_pass_and_capture_still_ends() {
    let mut script = Script::block(bright_loud_block());
    script.read_delay = Duration::from_millis(300);
    let (session, calls) = ready_session(script);
    let volume = FakeVolume::new(80, 100);

    let monitor = Monitor::new(fast_config());
    let mut status = monitor.subscribe_status();
    let handle = monitor.spawn(
        Arc::clone(&session),
        Arc::new(FixedPreferences::default()),
        volume.clone(),
    );

    tokio::time::sleep(Duration::from_millis(30)).await;
    tokio::time::timeout(Duration::from_millis(150), handle.stop())
        .await
        .expect("stop should not wait for the read");

    let first = status.recv().await.expect("status event");
    assert_eq!(first.status, MonitorStatus::Monitoring);
    let last = status.recv().await.expect("status event");
    assert_eq!(last.status, MonitorStatus::Stopped);

    // The abandoned pass finishes on the blocking pool and stops capture.
    let calls_for_wait = Arc::clone(&calls);
    let stopped = tokio::task::spawn_blocking(move || {
        common::wait_for(Duration::from_secs(2), || {
            Calls::count(&calls_for_wait.stops) == Calls::count(&calls_for_wait.starts)
        })
    })
    .await
    .expect("wait task");
    assert!(stopped);
    assert!(!calls.capturing.load(Ordering::SeqCst));
    assert!(volume.sets.lock().is_empty());
}

#[tokio::test]
async fn uninitialized_session_reports_error_status() {
    let (backend, calls, _) = ScriptedBackend::new(Script::block(bright_loud_block()));
    let session = Arc::new(AnalyzerSession::new(backend).expect("create session"));
    let volume = FakeVolume::new(80, 100);

    let monitor = Monitor::new(fast_config());
    let mut status = monitor.subscribe_status();
    let mut detections = monitor.subscribe_detections();
    let handle = monitor.spawn(session, Arc::new(FixedPreferences::default()), volume.clone());

    let first = status.recv().await.expect("status event");
    assert_eq!(first.status, MonitorStatus::Error);
    assert!(first.detail.is_some());

    let event = detections.recv().await.expect("detection event");
    assert!(!event.is_advertisement);
    handle.stop().await;

    assert_eq!(Calls::count(&calls.starts), 0);
}
