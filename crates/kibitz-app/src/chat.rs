//! 사용자 대화.
//!
//! 입력한 메시지를 페르소나와 함께 텍스트 전용 요청으로 보내고,
//! 주고받은 내용을 오늘 일기에 남긴다. 사용자 활동은 침묵 타이머를
//! 재설정하므로 대화 중에는 침묵 발화가 뒤로 밀린다.

use std::sync::Arc;

use chrono::Local;
use kibitz_core::config::PromptConfig;
use kibitz_core::error::CoreError;
use kibitz_core::ports::diary::DiaryStore;
use kibitz_core::ports::vision::VisionAnalyzer;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cycle::CycleGate;

/// 대화 한 건의 일기 레코드
pub fn exchange_record(message: &str, reply: &str) -> String {
    format!("사용자: {}\nAI: {}", message.trim(), reply.trim())
}

/// 사용자 메시지 → AI 답변
pub struct UserChat {
    gate: CycleGate,
    analyzer: Arc<dyn VisionAnalyzer>,
    prompts: PromptConfig,
    diary: Option<Arc<dyn DiaryStore>>,
}

impl UserChat {
    pub fn new(gate: CycleGate, analyzer: Arc<dyn VisionAnalyzer>, prompts: PromptConfig) -> Self {
        Self {
            gate,
            analyzer,
            prompts,
            diary: None,
        }
    }

    pub fn with_diary(mut self, diary: Arc<dyn DiaryStore>) -> Self {
        self.diary = Some(diary);
        self
    }

    /// 페르소나 + 사용자 메시지 + 대화 지시문
    pub fn prompt_for(&self, message: &str) -> String {
        format!(
            "{}\n\n사용자: {}\n\n{}",
            self.prompts.persona, message, self.prompts.chat_instruction
        )
    }

    /// 메시지 전송.
    ///
    /// 침묵 타이머는 요청 전에 재설정된다 (응답 실패와 무관).
    /// 일기 기록 실패는 경고만 남기고 답변은 그대로 반환한다.
    pub async fn send(&self, message: &str) -> Result<String, CoreError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(CoreError::Validation {
                field: "message".to_string(),
                message: "빈 메시지".to_string(),
            });
        }

        self.gate.touch(Instant::now());
        debug!(provider = self.analyzer.provider_name(), "사용자 메시지 전송");

        let reply = self.analyzer.chat(&self.prompt_for(message)).await?;

        if let Some(diary) = &self.diary {
            let date_key = Local::now().format("%Y-%m-%d").to_string();
            if let Err(e) = diary
                .append_record(&date_key, &exchange_record(message, &reply))
                .await
            {
                warn!("대화 일기 기록 실패: {e}");
            }
        }
        Ok(reply)
    }
}
