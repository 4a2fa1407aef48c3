//! 모니터링 스케줄러.
//!
//! 고정 주기 틱마다 발화 정책을 평가하고, 발화 시 캡처→분석→보고 사이클을
//! 백그라운드에서 실행한다. 수동 트리거와 같은 [`CycleGate`]를 공유하므로
//! 두 경로의 사이클은 절대 겹치지 않는다.

use std::sync::Arc;
use std::time::Duration;

use kibitz_core::config::TriggerConfig;
use kibitz_core::error::CoreError;
use kibitz_core::models::cycle::{CycleReport, SchedulerState};
use kibitz_vision::trigger::TriggerPolicy;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cycle::{spawn_cycle, CycleDeps, CycleGate, TickDecision};

/// 틱마다 1..=100 균등 난수를 뽑는 소스
pub trait RandomDraw: Send + Sync {
    fn draw(&self) -> u8;
}

/// 스레드 로컬 RNG 기반 추첨
pub struct ThreadRngDraw;

impl RandomDraw for ThreadRngDraw {
    fn draw(&self) -> u8 {
        rand::random_range(1..=100u8)
    }
}

/// 모니터링 스케줄러
pub struct MonitorScheduler {
    gate: CycleGate,
    deps: CycleDeps,
    trigger_config: Arc<Mutex<TriggerConfig>>,
    random: Arc<dyn RandomDraw>,
    /// 현재 틱 루프의 정지 신호
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl MonitorScheduler {
    /// 새 스케줄러 생성 (정지 상태)
    pub fn new(gate: CycleGate, deps: CycleDeps, trigger_config: TriggerConfig) -> Self {
        Self {
            gate,
            deps,
            trigger_config: Arc::new(Mutex::new(trigger_config)),
            random: Arc::new(ThreadRngDraw),
            stop_tx: Mutex::new(None),
        }
    }

    /// 난수 소스 교체
    pub fn with_random(mut self, random: Arc<dyn RandomDraw>) -> Self {
        self.random = random;
        self
    }

    /// 틱 루프 시작. 이미 실행 중이면 아무것도 하지 않고 false.
    pub fn start(&self, tick_interval: Duration) -> bool {
        let tick_interval = tick_interval.max(Duration::from_millis(1));
        let now = Instant::now();
        let Some(generation) = self.gate.start(now) else {
            debug!("스케줄러 이미 실행 중");
            return false;
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        if let Some(previous) = self.stop_tx.lock().replace(stop_tx) {
            let _ = previous.send(true);
        }

        let tick = TickContext {
            gate: self.gate.clone(),
            deps: self.deps.clone(),
            trigger_config: self.trigger_config.clone(),
            random: self.random.clone(),
            generation,
        };
        tokio::spawn(tick.run(now, tick_interval, stop_rx));

        info!(
            "모니터링 시작 (틱 {}s, 확률 {}%, 침묵 {}s)",
            tick_interval.as_secs_f32(),
            self.trigger_config.lock().random_probability_percent,
            self.trigger_config.lock().silence_timeout_secs
        );
        true
    }

    /// 틱 루프 정지. 진행 중인 사이클은 끝까지 실행되어 보고된다.
    pub fn stop(&self) -> bool {
        if !self.gate.stop() {
            return false;
        }
        if let Some(tx) = self.stop_tx.lock().take() {
            let _ = tx.send(true);
        }
        info!("모니터링 정지");
        true
    }

    /// 발화 정책 변경: 다음 틱부터 적용
    pub fn set_trigger_config(&self, config: TriggerConfig) {
        *self.trigger_config.lock() = config;
        debug!(?config, "발화 정책 변경");
    }

    pub fn trigger_config(&self) -> TriggerConfig {
        *self.trigger_config.lock()
    }

    pub fn is_running(&self) -> bool {
        self.gate.snapshot().running
    }

    pub fn snapshot(&self) -> SchedulerState {
        self.gate.snapshot()
    }
}

struct TickContext {
    gate: CycleGate,
    deps: CycleDeps,
    trigger_config: Arc<Mutex<TriggerConfig>>,
    random: Arc<dyn RandomDraw>,
    generation: u64,
}

impl TickContext {
    async fn run(self, started: Instant, period: Duration, mut stop_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval_at(started + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                now = interval.tick() => {
                    if !self.on_tick(now) {
                        break;
                    }
                }
                _ = stop_rx.changed() => {
                    break;
                }
            }
        }
        debug!(generation = self.generation, "틱 루프 종료");
    }

    /// 틱 처리. 루프를 계속할지 반환.
    fn on_tick(&self, now: Instant) -> bool {
        let draw = self.random.draw();
        let config = *self.trigger_config.lock();

        match self.gate.try_fire_scheduled(now, self.generation, |state| {
            TriggerPolicy::should_fire(now, state, &config, draw)
        }) {
            TickDecision::Stopped => false,
            TickDecision::Busy => {
                debug!("사이클 진행 중, 틱 생략");
                true
            }
            TickDecision::Hold => true,
            TickDecision::Fire(permit) => {
                spawn_cycle(permit, self.deps.clone());
                true
            }
        }
    }
}

/// 수동 트리거: 스케줄러 실행 여부와 무관하게 즉시 한 사이클 실행
#[derive(Clone)]
pub struct ManualTrigger {
    gate: CycleGate,
    deps: CycleDeps,
}

impl ManualTrigger {
    pub fn new(gate: CycleGate, deps: CycleDeps) -> Self {
        Self { gate, deps }
    }

    /// 즉시 실행. 진행 중인 사이클이 있으면 대기하지 않고 `Busy`.
    pub fn fire_now(&self) -> Result<JoinHandle<CycleReport>, CoreError> {
        let permit = self.gate.try_fire_manual(Instant::now())?;
        info!("수동 분석 요청");
        Ok(spawn_cycle(permit, self.deps.clone()))
    }
}
