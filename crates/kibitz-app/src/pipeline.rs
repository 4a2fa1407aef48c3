//! 캡처 → 분석 파이프라인.

use std::sync::Arc;

use async_trait::async_trait;
use kibitz_core::config::PromptConfig;
use kibitz_core::error::CoreError;
use kibitz_core::models::capture_mode::CaptureMode;
use kibitz_core::models::cycle::CycleKind;
use kibitz_core::ports::capture::{CapturedImage, ScreenCapturer};
use kibitz_core::ports::cycle::CyclePipeline;
use kibitz_core::ports::vision::VisionAnalyzer;
use tracing::debug;

/// 캡처 후 비전 분석
pub struct CaptureAnalyzePipeline {
    capturer: Arc<dyn ScreenCapturer>,
    analyzer: Arc<dyn VisionAnalyzer>,
    prompts: PromptConfig,
}

impl CaptureAnalyzePipeline {
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        analyzer: Arc<dyn VisionAnalyzer>,
        prompts: PromptConfig,
    ) -> Self {
        Self {
            capturer,
            analyzer,
            prompts,
        }
    }

    /// 사이클 종류별 프롬프트 (페르소나 + 지시문)
    pub fn prompt_for(&self, kind: CycleKind) -> String {
        let instruction = match kind {
            CycleKind::Scheduled => &self.prompts.scheduled_instruction,
            CycleKind::Manual => &self.prompts.manual_instruction,
        };
        format!("{}\n\n{}", self.prompts.persona, instruction)
    }
}

#[async_trait]
impl CyclePipeline for CaptureAnalyzePipeline {
    async fn run(&self, mode: CaptureMode, kind: CycleKind) -> Result<String, CoreError> {
        let capturer = self.capturer.clone();
        let image: CapturedImage = tokio::task::spawn_blocking(move || capturer.capture(mode))
            .await
            .map_err(|e| CoreError::Internal(format!("캡처 태스크 실패: {e}")))??;

        debug!(
            width = image.width,
            height = image.height,
            bytes = image.png.len(),
            provider = self.analyzer.provider_name(),
            "캡처 완료, 분석 요청"
        );

        self.analyzer.analyze(&image, &self.prompt_for(kind)).await
    }
}

/// API 키가 없을 때 사용하는 분석기: 항상 설정 에러
pub struct UnconfiguredAnalyzer {
    reason: String,
}

impl UnconfiguredAnalyzer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl VisionAnalyzer for UnconfiguredAnalyzer {
    async fn analyze(&self, _image: &CapturedImage, _prompt: &str) -> Result<String, CoreError> {
        Err(CoreError::Config(self.reason.clone()))
    }

    async fn chat(&self, _prompt: &str) -> Result<String, CoreError> {
        Err(CoreError::Config(self.reason.clone()))
    }

    fn provider_name(&self) -> &str {
        "unconfigured"
    }
}
