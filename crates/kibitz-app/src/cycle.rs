//! 분석 사이클 게이트.
//!
//! 스케줄 경로와 수동 경로가 공유하는 단일 상호 배제 지점.
//! `in_flight` 확인과 `last_fire` 갱신은 한 번의 잠금 안에서 수행된다.

use std::sync::Arc;

use chrono::Local;
use kibitz_core::error::CoreError;
use kibitz_core::models::capture_mode::CaptureMode;
use kibitz_core::models::cycle::{CycleKind, CycleReport, SchedulerState};
use kibitz_core::ports::cycle::{CaptureModeProvider, CyclePipeline};
use kibitz_core::ports::report::ReportSink;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct GateState {
    sched: SchedulerState,
    /// start/stop마다 증가: 이전 틱 루프가 살아남지 못하게 함
    generation: u64,
}

/// 스케줄 틱 판정 결과
#[derive(Debug)]
pub enum TickDecision {
    /// 정지됨 (또는 다른 세대의 루프)
    Stopped,
    /// 진행 중인 사이클이 있어 틱 생략
    Busy,
    /// 발화하지 않음
    Hold,
    /// 발화: 사이클 실행 권한
    Fire(CyclePermit),
}

/// 공유 사이클 게이트
#[derive(Clone)]
pub struct CycleGate {
    inner: Arc<Mutex<GateState>>,
}

impl CycleGate {
    pub fn new(now: Instant) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GateState {
                sched: SchedulerState::new(now),
                generation: 0,
            })),
        }
    }

    /// 현재 상태 복사본
    pub fn snapshot(&self) -> SchedulerState {
        self.inner.lock().sched
    }

    /// 실행 상태로 전환. 이미 실행 중이면 None.
    ///
    /// 침묵 타이머 기준점은 시작 시각으로 초기화된다.
    pub(crate) fn start(&self, now: Instant) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.sched.running {
            return None;
        }
        inner.generation += 1;
        inner.sched.running = true;
        inner.sched.last_fire = now;
        Some(inner.generation)
    }

    /// 정지 상태로 전환. 실행 중이 아니었으면 false.
    pub(crate) fn stop(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.sched.running {
            return false;
        }
        inner.generation += 1;
        inner.sched.running = false;
        true
    }

    /// 스케줄 틱: 확인, 판정, 점유를 하나의 임계 구역에서 수행
    pub fn try_fire_scheduled<F>(&self, now: Instant, generation: u64, decide: F) -> TickDecision
    where
        F: FnOnce(&SchedulerState) -> bool,
    {
        let mut inner = self.inner.lock();
        if !inner.sched.running || inner.generation != generation {
            return TickDecision::Stopped;
        }
        if inner.sched.in_flight {
            return TickDecision::Busy;
        }
        if !decide(&inner.sched) {
            return TickDecision::Hold;
        }
        inner.sched.in_flight = true;
        inner.sched.last_fire = now;
        TickDecision::Fire(CyclePermit {
            gate: self.inner.clone(),
            kind: CycleKind::Scheduled,
        })
    }

    /// 수동 실행: 진행 중이면 즉시 `Busy`, 상태는 변경하지 않음
    pub fn try_fire_manual(&self, now: Instant) -> Result<CyclePermit, CoreError> {
        let mut inner = self.inner.lock();
        if inner.sched.in_flight {
            return Err(CoreError::Busy);
        }
        inner.sched.in_flight = true;
        inner.sched.last_fire = now;
        Ok(CyclePermit {
            gate: self.inner.clone(),
            kind: CycleKind::Manual,
        })
    }

    /// 사용자 활동 기록: 침묵 타이머만 재설정하고 사이클은 점유하지 않는다
    pub fn touch(&self, now: Instant) {
        let mut inner = self.inner.lock();
        if now > inner.sched.last_fire {
            inner.sched.last_fire = now;
        }
    }
}

/// 사이클 실행 권한. 드롭 시 `in_flight` 해제 (성공/실패/패닉 모두).
pub struct CyclePermit {
    gate: Arc<Mutex<GateState>>,
    kind: CycleKind,
}

impl CyclePermit {
    pub fn kind(&self) -> CycleKind {
        self.kind
    }
}

impl std::fmt::Debug for CyclePermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CyclePermit").field("kind", &self.kind).finish()
    }
}

impl Drop for CyclePermit {
    fn drop(&mut self) {
        let mut inner = self.gate.lock();
        debug_assert!(inner.sched.in_flight, "사이클 게이트 불변식 위반");
        inner.sched.in_flight = false;
    }
}

/// 사이클 협력자 묶음
#[derive(Clone)]
pub struct CycleDeps {
    pub mode_provider: Arc<dyn CaptureModeProvider>,
    pub pipeline: Arc<dyn CyclePipeline>,
    pub sink: Arc<dyn ReportSink>,
}

/// 사이클 하나를 실행하고 보고.
///
/// 모드는 사이클 시작 시 한 번만 읽는다. 보고 전에 권한을 반납한다.
pub async fn run_cycle(permit: CyclePermit, deps: CycleDeps) -> CycleReport {
    let kind = permit.kind();
    let mode: CaptureMode = deps.mode_provider.current_mode();
    let started = Instant::now();
    info!(kind = %kind, mode = %mode, "사이클 시작");

    let result = deps.pipeline.run(mode, kind).await;
    drop(permit);

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let finished_at = Local::now();
    let report = match result {
        Ok(text) => {
            info!(kind = %kind, elapsed_ms, "사이클 완료");
            CycleReport::Success {
                kind,
                mode,
                text,
                finished_at,
            }
        }
        Err(e) => {
            warn!(kind = %kind, elapsed_ms, "사이클 실패: {e}");
            CycleReport::Failure {
                kind,
                mode,
                reason: e.to_string(),
                finished_at,
            }
        }
    };

    deps.sink.report(report.clone()).await;
    debug!(kind = %kind, "사이클 보고 완료");
    report
}

/// 백그라운드에서 사이클 실행
pub fn spawn_cycle(permit: CyclePermit, deps: CycleDeps) -> JoinHandle<CycleReport> {
    tokio::spawn(run_cycle(permit, deps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn manual_is_busy_while_scheduled_cycle_holds_permit() {
        let gate = CycleGate::new(Instant::now());
        let generation = gate.start(Instant::now()).unwrap();

        let permit = match gate.try_fire_scheduled(Instant::now(), generation, |_| true) {
            TickDecision::Fire(p) => p,
            _ => panic!("expected fire"),
        };
        let before = gate.snapshot();
        assert_matches!(gate.try_fire_manual(Instant::now()), Err(CoreError::Busy));
        let after = gate.snapshot();
        assert_eq!(before.last_fire, after.last_fire);
        assert!(after.in_flight);

        drop(permit);
        assert!(!gate.snapshot().in_flight);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_tick_skips_without_deciding() {
        let gate = CycleGate::new(Instant::now());
        let generation = gate.start(Instant::now()).unwrap();
        let _permit = gate.try_fire_manual(Instant::now()).unwrap();

        let mut consulted = false;
        let decision = gate.try_fire_scheduled(Instant::now(), generation, |_| {
            consulted = true;
            true
        });
        assert_matches!(decision, TickDecision::Busy);
        assert!(!consulted);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_stopped() {
        let gate = CycleGate::new(Instant::now());
        let old = gate.start(Instant::now()).unwrap();
        assert!(gate.stop());
        let new = gate.start(Instant::now()).unwrap();
        assert_ne!(old, new);
        assert_matches!(
            gate.try_fire_scheduled(Instant::now(), old, |_| true),
            TickDecision::Stopped
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_resets_silence_baseline() {
        let gate = CycleGate::new(Instant::now());
        tokio::time::advance(Duration::from_secs(100)).await;
        let now = Instant::now();
        gate.start(now).unwrap();
        assert_eq!(gate.snapshot().last_fire, now);
        assert!(gate.start(now).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn touch_moves_baseline_without_claiming() {
        let gate = CycleGate::new(Instant::now());
        let generation = gate.start(Instant::now()).unwrap();
        tokio::time::advance(Duration::from_secs(7)).await;

        let now = Instant::now();
        gate.touch(now);
        let state = gate.snapshot();
        assert_eq!(state.last_fire, now);
        assert!(!state.in_flight);
        assert!(state.running);

        // 진행 중인 사이클과 공존
        let permit = gate.try_fire_manual(Instant::now()).unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        gate.touch(Instant::now());
        assert!(gate.snapshot().in_flight);
        drop(permit);

        assert_matches!(
            gate.try_fire_scheduled(Instant::now(), generation, |_| true),
            TickDecision::Fire(_)
        );
    }

    #[test]
    fn permit_released_on_panic() {
        let gate = CycleGate::new(Instant::now());
        let permit = gate.try_fire_manual(Instant::now()).unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _held = permit;
            panic!("pipeline exploded");
        }));
        assert!(result.is_err());
        assert!(!gate.snapshot().in_flight);
    }
}
