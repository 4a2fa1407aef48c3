//! 스케줄러 / 수동 트리거 / 영역 선택 통합 테스트.
//!
//! 가상 시간(`start_paused`)으로 틱을 결정적으로 진행시킨다.

use async_trait::async_trait;
use kibitz_app::chat::UserChat;
use kibitz_app::console::ConsoleWindow;
use kibitz_app::cycle::{CycleDeps, CycleGate};
use kibitz_app::mode_store::CaptureModeStore;
use kibitz_app::scheduler::{ManualTrigger, MonitorScheduler, RandomDraw};
use kibitz_app::selector::{RegionSelector, SelectionOutcome};
use kibitz_core::config::{PromptConfig, TriggerConfig};
use kibitz_core::error::{CoreError, RejectReason};
use kibitz_core::models::capture_mode::CaptureMode;
use kibitz_core::models::cycle::{CycleKind, CycleReport};
use kibitz_core::models::region::{Point, RegionGeometry};
use kibitz_core::ports::capture::CapturedImage;
use kibitz_core::ports::cycle::{CaptureModeProvider, CyclePipeline};
use kibitz_core::ports::report::ReportSink;
use kibitz_core::ports::vision::VisionAnalyzer;
use kibitz_core::ports::window::{WindowController, WindowState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

const TICK: Duration = Duration::from_secs(5);

struct FixedDraw(u8);

impl RandomDraw for FixedDraw {
    fn draw(&self) -> u8 {
        self.0
    }
}

/// 호출 횟수, 동시 실행 수, 모드를 기록하는 파이프라인
#[derive(Default)]
struct RecordingPipeline {
    runs: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
    modes: Mutex<Vec<CaptureMode>>,
    work: Duration,
    fail: bool,
}

impl RecordingPipeline {
    fn with_work(work: Duration) -> Self {
        Self {
            work,
            ..Default::default()
        }
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CyclePipeline for RecordingPipeline {
    async fn run(&self, mode: CaptureMode, _kind: CycleKind) -> Result<String, CoreError> {
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.modes.lock().unwrap().push(mode);

        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            Err(CoreError::Capture("display unavailable".to_string()))
        } else {
            Ok("nice move".to_string())
        }
    }
}

/// 첫 사이클을 외부 신호까지 붙잡아 두는 파이프라인
struct GatedPipeline {
    release: Notify,
    entered: Notify,
}

#[async_trait]
impl CyclePipeline for GatedPipeline {
    async fn run(&self, _mode: CaptureMode, _kind: CycleKind) -> Result<String, CoreError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("done".to_string())
    }
}

struct ChattyAnalyzer;

#[async_trait]
impl VisionAnalyzer for ChattyAnalyzer {
    async fn analyze(&self, _image: &CapturedImage, _prompt: &str) -> Result<String, CoreError> {
        Ok("screen".to_string())
    }

    async fn chat(&self, _prompt: &str) -> Result<String, CoreError> {
        Ok("hi".to_string())
    }

    fn provider_name(&self) -> &str {
        "chatty"
    }
}

#[derive(Default)]
struct CollectingSink {
    reports: Mutex<Vec<CycleReport>>,
}

#[async_trait]
impl ReportSink for CollectingSink {
    async fn report(&self, report: CycleReport) {
        self.reports.lock().unwrap().push(report);
    }
}

struct Harness {
    gate: CycleGate,
    deps: CycleDeps,
    sink: Arc<CollectingSink>,
}

fn harness(
    mode_provider: Arc<dyn CaptureModeProvider>,
    pipeline: Arc<dyn CyclePipeline>,
) -> Harness {
    let sink = Arc::new(CollectingSink::default());
    let deps = CycleDeps {
        mode_provider,
        pipeline,
        sink: sink.clone(),
    };
    Harness {
        gate: CycleGate::new(Instant::now()),
        deps,
        sink,
    }
}

fn trigger(probability: u8, silence_secs: u64) -> TriggerConfig {
    TriggerConfig {
        random_probability_percent: probability,
        silence_timeout_secs: silence_secs,
    }
}

fn full_screen() -> Arc<dyn CaptureModeProvider> {
    Arc::new(CaptureModeStore::in_memory(CaptureMode::FullScreen))
}

#[tokio::test(start_paused = true)]
async fn starting_twice_runs_a_single_tick_loop() {
    let pipeline = Arc::new(RecordingPipeline::default());
    let h = harness(full_screen(), pipeline.clone());
    let scheduler = MonitorScheduler::new(h.gate.clone(), h.deps.clone(), trigger(100, 30))
        .with_random(Arc::new(FixedDraw(100)));

    assert!(scheduler.start(TICK));
    assert!(!scheduler.start(TICK));

    tokio::time::sleep(Duration::from_millis(5_100)).await;
    assert_eq!(pipeline.runs(), 1);

    tokio::time::sleep(TICK).await;
    assert_eq!(pipeline.runs(), 2);
    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn full_probability_fires_every_tick_and_advances_last_fire() {
    let pipeline = Arc::new(RecordingPipeline::default());
    let h = harness(full_screen(), pipeline.clone());
    let scheduler = MonitorScheduler::new(h.gate.clone(), h.deps.clone(), trigger(100, 3_600))
        .with_random(Arc::new(FixedDraw(100)));

    let started = Instant::now();
    scheduler.start(TICK);

    for n in 1..=4u32 {
        tokio::time::sleep_until(started + TICK * n + Duration::from_millis(100)).await;
        assert_eq!(pipeline.runs(), n as usize);
        assert_eq!(scheduler.snapshot().last_fire, started + TICK * n);
        assert!(!scheduler.snapshot().in_flight);
    }
    assert_eq!(h.sink.reports.lock().unwrap().len(), 4);
    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn silence_timeout_fires_when_draw_never_hits() {
    let pipeline = Arc::new(RecordingPipeline::default());
    let h = harness(full_screen(), pipeline.clone());
    let scheduler = MonitorScheduler::new(h.gate.clone(), h.deps.clone(), trigger(0, 12))
        .with_random(Arc::new(FixedDraw(50)));

    let started = Instant::now();
    scheduler.start(TICK);

    tokio::time::sleep(Duration::from_millis(14_000)).await;
    assert_eq!(pipeline.runs(), 0);

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert_eq!(pipeline.runs(), 1);
    assert_eq!(scheduler.snapshot().last_fire, started + Duration::from_secs(15));

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(pipeline.runs(), 2);
    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn chat_message_pushes_back_silence_fire() {
    let pipeline = Arc::new(RecordingPipeline::default());
    let h = harness(full_screen(), pipeline.clone());
    let scheduler = MonitorScheduler::new(h.gate.clone(), h.deps.clone(), trigger(0, 12))
        .with_random(Arc::new(FixedDraw(50)));
    let chat = UserChat::new(h.gate.clone(), Arc::new(ChattyAnalyzer), PromptConfig::default());

    let started = Instant::now();
    scheduler.start(TICK);

    // 침묵 발화(15초 틱) 전에 대화
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(chat.send("안녕").await.unwrap(), "hi");
    assert_eq!(h.gate.snapshot().last_fire, started + Duration::from_secs(7));
    assert!(!h.gate.snapshot().in_flight);

    tokio::time::sleep_until(started + Duration::from_millis(16_000)).await;
    assert_eq!(pipeline.runs(), 0);

    tokio::time::sleep_until(started + Duration::from_millis(21_000)).await;
    assert_eq!(pipeline.runs(), 1);
    assert_eq!(scheduler.snapshot().last_fire, started + Duration::from_secs(20));
    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn manual_fire_is_busy_while_cycle_in_flight() {
    let pipeline = Arc::new(GatedPipeline {
        release: Notify::new(),
        entered: Notify::new(),
    });
    let h = harness(full_screen(), pipeline.clone());
    let manual = ManualTrigger::new(h.gate.clone(), h.deps.clone());

    let first = manual.fire_now().unwrap();
    pipeline.entered.notified().await;

    let before = h.gate.snapshot();
    assert!(before.in_flight);
    assert!(matches!(manual.fire_now(), Err(CoreError::Busy)));
    assert_eq!(h.gate.snapshot().last_fire, before.last_fire);

    pipeline.release.notify_one();
    let report = first.await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.kind(), CycleKind::Manual);
    assert!(!h.gate.snapshot().in_flight);

    let second = manual.fire_now().unwrap();
    pipeline.entered.notified().await;
    pipeline.release.notify_one();
    assert!(second.await.unwrap().is_success());
}

#[tokio::test(start_paused = true)]
async fn at_most_one_cycle_in_flight_across_both_paths() {
    // 한 사이클이 틱 두 번 이상 걸림
    let pipeline = Arc::new(RecordingPipeline::with_work(Duration::from_secs(12)));
    let h = harness(full_screen(), pipeline.clone());
    let scheduler = MonitorScheduler::new(h.gate.clone(), h.deps.clone(), trigger(100, 30))
        .with_random(Arc::new(FixedDraw(1)));
    let manual = ManualTrigger::new(h.gate.clone(), h.deps.clone());

    scheduler.start(TICK);
    let mut busy = 0;
    for _ in 0..30 {
        tokio::time::sleep(Duration::from_millis(1_700)).await;
        if matches!(manual.fire_now(), Err(CoreError::Busy)) {
            busy += 1;
        }
    }
    scheduler.stop();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(pipeline.max_running.load(Ordering::SeqCst), 1);
    assert!(busy > 0);
    assert!(pipeline.runs() >= 3);
    assert!(!h.gate.snapshot().in_flight);
    assert_eq!(h.sink.reports.lock().unwrap().len(), pipeline.runs());
}

#[tokio::test(start_paused = true)]
async fn failing_cycles_are_reported_and_scheduler_keeps_running() {
    let pipeline = Arc::new(RecordingPipeline {
        fail: true,
        ..Default::default()
    });
    let h = harness(full_screen(), pipeline.clone());
    let scheduler = MonitorScheduler::new(h.gate.clone(), h.deps.clone(), trigger(100, 30))
        .with_random(Arc::new(FixedDraw(1)));

    scheduler.start(TICK);
    tokio::time::sleep(Duration::from_millis(15_100)).await;

    assert!(scheduler.is_running());
    assert_eq!(pipeline.runs(), 3);
    let reports = h.sink.reports.lock().unwrap();
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| !r.is_success()));
    drop(reports);
    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn restart_resets_silence_baseline() {
    let pipeline = Arc::new(RecordingPipeline::default());
    let h = harness(full_screen(), pipeline.clone());
    let scheduler = MonitorScheduler::new(h.gate.clone(), h.deps.clone(), trigger(0, 10))
        .with_random(Arc::new(FixedDraw(50)));

    // 정지 상태로 오래 대기해도 재시작 직후 바로 발화하지 않음
    tokio::time::sleep(Duration::from_secs(120)).await;
    scheduler.start(TICK);
    tokio::time::sleep(Duration::from_millis(5_100)).await;
    assert_eq!(pipeline.runs(), 0);

    tokio::time::sleep(TICK).await;
    assert_eq!(pipeline.runs(), 1);
    scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn mode_switch_mid_cycle_applies_to_next_cycle() {
    let store = Arc::new(CaptureModeStore::in_memory(CaptureMode::FullScreen));
    let pipeline = Arc::new(GatedPipeline {
        release: Notify::new(),
        entered: Notify::new(),
    });
    let h = harness(store.clone(), pipeline.clone());
    let manual = ManualTrigger::new(h.gate.clone(), h.deps.clone());
    let region = RegionGeometry {
        x: 50,
        y: 60,
        width: 320,
        height: 240,
    };

    let first = manual.fire_now().unwrap();
    pipeline.entered.notified().await;
    store.switch_to_region(region).unwrap();
    pipeline.release.notify_one();
    assert_eq!(first.await.unwrap().mode(), CaptureMode::FullScreen);

    let second = manual.fire_now().unwrap();
    pipeline.entered.notified().await;
    pipeline.release.notify_one();
    assert_eq!(second.await.unwrap().mode(), CaptureMode::Region(region));
}

#[test]
fn cancel_after_pointer_down_restores_window_and_keeps_mode() {
    let window = Arc::new(ConsoleWindow::new());
    let store = Arc::new(CaptureModeStore::in_memory(CaptureMode::FullScreen));
    let selector = RegionSelector::new(window.clone());
    let outcomes = Arc::new(Mutex::new(Vec::new()));

    let on_finish = {
        let outcomes = outcomes.clone();
        let store = store.clone();
        Box::new(move |outcome: SelectionOutcome| {
            if let SelectionOutcome::Completed(g) = outcome {
                store.switch_to_region(g).unwrap();
            }
            outcomes.lock().unwrap().push(outcome);
        })
    };

    let mut session = selector.begin(on_finish).unwrap();
    assert_eq!(
        window.state(),
        WindowState {
            visible: false,
            topmost: false
        }
    );
    session.pointer_down(Point::new(100, 100));
    session.cancel();

    assert_eq!(
        *outcomes.lock().unwrap(),
        vec![SelectionOutcome::Cancelled(RejectReason::UserCancelled)]
    );
    assert_eq!(
        window.state(),
        WindowState {
            visible: true,
            topmost: true
        }
    );
    assert_eq!(store.current_mode(), CaptureMode::FullScreen);
    assert!(!selector.is_active());
}
