//! 분석 사이클 포트.
//!
//! 스케줄러와 수동 트리거가 공유하는 협력자 인터페이스.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::capture_mode::CaptureMode;
use crate::models::cycle::CycleKind;

/// 현재 캡처 모드 제공자 (전체 값을 원자적으로 읽음)
pub trait CaptureModeProvider: Send + Sync {
    fn current_mode(&self) -> CaptureMode;
}

/// 캡처 → 분석 파이프라인.
///
/// `mode`는 사이클 시작 시 한 번 읽은 값이다.
#[async_trait]
pub trait CyclePipeline: Send + Sync {
    async fn run(&self, mode: CaptureMode, kind: CycleKind) -> Result<String, CoreError>;
}
