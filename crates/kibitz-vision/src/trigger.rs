//! 발화 정책.
//!
//! 스케줄러 틱마다 분석 사이클을 시작할지 결정한다.
//! 확률 추첨 또는 침묵 타임아웃 중 하나라도 만족하면 발화.

use kibitz_core::config::TriggerConfig;
use kibitz_core::models::cycle::SchedulerState;
use tokio::time::Instant;
use tracing::debug;

/// 발화 판정 근거
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireReason {
    /// 확률 추첨 당첨
    RandomDraw,
    /// 마지막 발화 후 침묵 타임아웃 경과
    SilenceTimeout,
}

/// 틱 단위 발화 정책: 상태 없음
pub struct TriggerPolicy;

impl TriggerPolicy {
    /// 발화 여부.
    ///
    /// `random_draw`는 틱마다 새로 뽑은 1..=100 균등 난수.
    /// 확률 0이면 추첨은 절대 당첨되지 않고, 100이면 항상 당첨된다.
    pub fn should_fire(
        now: Instant,
        state: &SchedulerState,
        config: &TriggerConfig,
        random_draw: u8,
    ) -> bool {
        Self::evaluate(now, state, config, random_draw).is_some()
    }

    /// 발화 근거 반환 (발화하지 않으면 None)
    pub fn evaluate(
        now: Instant,
        state: &SchedulerState,
        config: &TriggerConfig,
        random_draw: u8,
    ) -> Option<FireReason> {
        if random_draw <= config.random_probability_percent {
            debug!(
                "발화: 추첨 {random_draw} <= {}%",
                config.random_probability_percent
            );
            return Some(FireReason::RandomDraw);
        }

        let silent_for = now.saturating_duration_since(state.last_fire);
        if silent_for >= config.silence_timeout() {
            debug!("발화: 침묵 {:.1}s 경과", silent_for.as_secs_f32());
            return Some(FireReason::SilenceTimeout);
        }

        None
    }
}
