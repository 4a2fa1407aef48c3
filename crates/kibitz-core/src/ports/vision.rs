//! 비전 추론 포트.
//!
//! 구현: `kibitz-network` crate (reqwest: OpenAI 호환 / Anthropic)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::ports::capture::CapturedImage;

/// 이미지 + 프롬프트 → 텍스트
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// 이미지 분석. 네트워크/인증 세부사항은 구현체 책임.
    async fn analyze(&self, image: &CapturedImage, prompt: &str) -> Result<String, CoreError>;

    /// 이미지 없이 텍스트 프롬프트만 보낸다 (사용자 대화)
    async fn chat(&self, prompt: &str) -> Result<String, CoreError>;

    /// 제공자 이름 (로그용, 예: 모델명)
    fn provider_name(&self) -> &str;
}
