//! 사이클 결과 보고 포트.

use async_trait::async_trait;

use crate::models::cycle::CycleReport;

/// 결과 보고 싱크.
///
/// 백그라운드 실행 컨텍스트에서 호출된다. 표시 계층이 스레드 친화성을
/// 요구하면 구현체가 포그라운드로 전달해야 한다.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn report(&self, report: CycleReport);
}
