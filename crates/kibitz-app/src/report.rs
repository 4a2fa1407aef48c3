//! 사이클 결과 보고.
//!
//! 성공한 코멘트는 오늘 날짜 일기에 남기고, 모든 결과를 이벤트 버스로 발행한다.

use std::sync::Arc;

use async_trait::async_trait;
use kibitz_core::models::cycle::CycleReport;
use kibitz_core::ports::diary::DiaryStore;
use kibitz_core::ports::report::ReportSink;
use tracing::warn;

use crate::event_bus::{AppEvent, EventBus};

/// 일기 기록 + 이벤트 발행 싱크
pub struct DiaryReportSink {
    diary: Option<Arc<dyn DiaryStore>>,
    bus: Arc<EventBus>,
}

impl DiaryReportSink {
    pub fn new(diary: Option<Arc<dyn DiaryStore>>, bus: Arc<EventBus>) -> Self {
        Self { diary, bus }
    }
}

/// 일기 한 줄 형식
pub fn diary_line(text: &str) -> String {
    format!("AI: {}", text.trim())
}

#[async_trait]
impl ReportSink for DiaryReportSink {
    async fn report(&self, report: CycleReport) {
        if let (Some(diary), CycleReport::Success { text, finished_at, .. }) =
            (&self.diary, &report)
        {
            let date_key = finished_at.format("%Y-%m-%d").to_string();
            if let Err(e) = diary.append_record(&date_key, &diary_line(text)).await {
                warn!("일기 기록 실패: {e}");
            }
        }
        self.bus.publish(AppEvent::CycleReported(report));
    }
}
