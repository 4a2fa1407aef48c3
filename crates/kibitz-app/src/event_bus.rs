//! 내부 이벤트 버스.
//!
//! `tokio::broadcast` 기반 내부 이벤트 라우팅.
//! 사이클 보고는 백그라운드 태스크에서 발행되고, 표시 계층은 구독해서 소비한다.

use kibitz_core::models::capture_mode::CaptureMode;
use kibitz_core::models::cycle::CycleReport;
use tokio::sync::broadcast;
use tracing::debug;

use crate::selector::SelectionOutcome;

/// 내부 앱 이벤트
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// 사이클 결과 (성공/실패)
    CycleReported(CycleReport),
    /// 캡처 모드 변경
    ModeChanged(CaptureMode),
    /// 영역 선택 종료
    SelectionFinished(SelectionOutcome),
    /// 스케줄러 시작/정지
    SchedulerStateChanged { running: bool },
}

/// 내부 이벤트 버스
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// 새 이벤트 버스 생성
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 이벤트 발행. 구독자가 없으면 버린다.
    pub fn publish(&self, event: AppEvent) {
        debug!("이벤트 발행: {:?}", std::mem::discriminant(&event));
        let _ = self.tx.send(event);
    }

    /// 구독자 생성
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}
