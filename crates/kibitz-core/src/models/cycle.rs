//! 분석 사이클 모델.
//!
//! 스케줄러 상태, 사이클 종류, 사이클 결과 보고.

use chrono::{DateTime, Local};
use tokio::time::Instant;

use super::capture_mode::CaptureMode;

/// 스케줄러 공유 상태.
///
/// 스케줄 경로와 수동 경로가 모두 하나의 뮤텍스 아래에서 읽고 쓴다.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerState {
    /// 틱 루프 실행 여부
    pub running: bool,
    /// 마지막 발화 결정 시각 (완료 시각이 아님)
    pub last_fire: Instant,
    /// 사이클 진행 중 여부: 동시에 최대 하나
    pub in_flight: bool,
}

impl SchedulerState {
    /// 초기 상태 (정지, 진행 중 사이클 없음)
    pub fn new(now: Instant) -> Self {
        Self {
            running: false,
            last_fire: now,
            in_flight: false,
        }
    }
}

/// 사이클 시작 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// 스케줄러 틱에서 발화
    Scheduled,
    /// 사용자가 즉시 실행 요청
    Manual,
}

impl std::fmt::Display for CycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduled => f.write_str("scheduled"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// 사이클 결과: 성공 텍스트 또는 실패 사유
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    Success {
        kind: CycleKind,
        /// 사이클 시작 시 읽은 캡처 모드
        mode: CaptureMode,
        text: String,
        finished_at: DateTime<Local>,
    },
    Failure {
        kind: CycleKind,
        mode: CaptureMode,
        reason: String,
        finished_at: DateTime<Local>,
    },
}

impl CycleReport {
    pub fn kind(&self) -> CycleKind {
        match self {
            Self::Success { kind, .. } | Self::Failure { kind, .. } => *kind,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        match self {
            Self::Success { mode, .. } | Self::Failure { mode, .. } => *mode,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
