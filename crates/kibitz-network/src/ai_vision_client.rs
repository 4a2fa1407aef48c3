//! 외부 AI 비전 클라이언트.
//!
//! 캡처 이미지(PNG)와 프롬프트를 외부 비전 모델 API에 보내고
//! 응답 텍스트를 반환한다.

use async_trait::async_trait;
use base64::Engine;
use tracing::{debug, warn};

use kibitz_core::config::{AiProviderType, VisionApiConfig};
use kibitz_core::error::CoreError;
use kibitz_core::ports::capture::CapturedImage;
use kibitz_core::ports::vision::VisionAnalyzer;

/// Anthropic API 버전 헤더 값
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// 오류 응답 본문 로그 최대 길이 (문자)
const ERROR_BODY_PREVIEW: usize = 200;

// ============================================================
// RemoteVisionAnalyzer: 외부 AI 비전 API 클라이언트
// ============================================================

/// 외부 AI 비전 API 클라이언트
///
/// 지원 API:
/// - OpenAI 호환 (OpenRouter 등): `POST .../chat/completions` + `image_url` data URL
/// - Claude (Anthropic): `POST /v1/messages` + base64 image block
#[derive(Debug)]
pub struct RemoteVisionAnalyzer {
    http_client: reqwest::Client,
    endpoint: String,
    /// API 키 (메모리에만 유지)
    api_key: String,
    model: String,
    max_tokens: u32,
    provider_type: AiProviderType,
}

impl RemoteVisionAnalyzer {
    /// 새 RemoteVisionAnalyzer 생성
    pub fn new(config: &VisionApiConfig) -> Result<Self, CoreError> {
        if config.api_key.trim().is_empty() {
            return Err(CoreError::Config(
                "비전 API 키 미설정. config.json 또는 KIBITZ_API_KEY로 지정하세요.".into(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        debug!(
            endpoint = %config.endpoint,
            model = %config.model,
            timeout = config.timeout_secs,
            "RemoteVisionAnalyzer 초기화"
        );

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.trim().to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            provider_type: config.provider_type,
        })
    }

    /// 요청 본문 구성. 이미지가 없으면 텍스트 전용 메시지.
    fn build_request_body(&self, image: Option<&CapturedImage>, prompt: &str) -> serde_json::Value {
        let encoded =
            image.map(|image| base64::engine::general_purpose::STANDARD.encode(&image.png));

        let content = match (self.provider_type, encoded) {
            (AiProviderType::Anthropic, Some(encoded)) => serde_json::json!([
                {
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": "image/png",
                        "data": encoded
                    }
                },
                { "type": "text", "text": prompt }
            ]),
            (AiProviderType::Anthropic, None) => {
                serde_json::json!([{ "type": "text", "text": prompt }])
            }
            (AiProviderType::OpenAi, Some(encoded)) => serde_json::json!([
                { "type": "text", "text": prompt },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/png;base64,{encoded}") }
                }
            ]),
            (AiProviderType::OpenAi, None) => serde_json::json!(prompt),
        };

        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": content }]
        })
    }

    /// 인증 헤더 적용
    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.provider_type {
            AiProviderType::Anthropic => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            AiProviderType::OpenAi => {
                builder.header("Authorization", format!("Bearer {}", self.api_key))
            }
        }
    }

    /// 요청 전송 후 응답 텍스트 추출
    async fn complete(&self, request_body: serde_json::Value) -> Result<String, CoreError> {
        let builder = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&request_body);

        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("비전 API 호출 실패: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("비전 API 응답 읽기 실패: {}", e)))?;

        if !status.is_success() {
            warn!(status = %status, "비전 API 오류 응답");
            return Err(CoreError::Inference(format!(
                "비전 API 오류 ({}): {}",
                status,
                body.chars().take(ERROR_BODY_PREVIEW).collect::<String>()
            )));
        }

        let text = match self.provider_type {
            AiProviderType::Anthropic => Self::parse_claude_response(&body)?,
            AiProviderType::OpenAi => Self::parse_openai_response(&body)?,
        };

        debug!(chars = text.chars().count(), "비전 API 응답 수신");
        Ok(text)
    }

    /// OpenAI 호환 응답 파싱: `choices[0].message.content`
    fn parse_openai_response(body: &str) -> Result<String, CoreError> {
        let response: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| CoreError::Inference(format!("응답 JSON 파싱 실패: {}", e)))?;

        response
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .map(|t| t.trim().to_string())
            .ok_or_else(|| CoreError::Inference("응답에서 텍스트를 찾을 수 없음".to_string()))
    }

    /// Claude 응답 파싱: `content[].text` 블록 연결
    fn parse_claude_response(body: &str) -> Result<String, CoreError> {
        let response: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| CoreError::Inference(format!("응답 JSON 파싱 실패: {}", e)))?;

        let blocks = response
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| CoreError::Inference("응답에서 텍스트를 찾을 수 없음".to_string()))?;

        let text: Vec<&str> = blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect();

        if text.is_empty() {
            return Err(CoreError::Inference(
                "응답에서 텍스트를 찾을 수 없음".to_string(),
            ));
        }
        Ok(text.join("\n").trim().to_string())
    }

    /// 모델 목록 URL: 엔드포인트의 마지막 경로를 `models`로 교체
    ///
    /// `.../v1/chat/completions` → `.../v1/models`, `.../v1/messages` → `.../v1/models`
    pub fn models_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let base = base
            .strip_suffix("/chat/completions")
            .or_else(|| base.strip_suffix("/messages"))
            .unwrap_or(base);
        format!("{base}/models")
    }

    /// API 연결 확인 (모델 목록 조회). 키와 엔드포인트가 유효하면 Ok.
    pub async fn check_connection(&self) -> Result<(), CoreError> {
        let url = self.models_url();
        debug!(url = %url, "비전 API 연결 확인");

        let response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("연결 확인 실패: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CoreError::Network(format!("연결 확인 실패 ({status})")))
        }
    }
}

#[async_trait]
impl VisionAnalyzer for RemoteVisionAnalyzer {
    async fn analyze(&self, image: &CapturedImage, prompt: &str) -> Result<String, CoreError> {
        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            image_size = image.png.len(),
            "비전 API 호출"
        );
        self.complete(self.build_request_body(Some(image), prompt)).await
    }

    async fn chat(&self, prompt: &str) -> Result<String, CoreError> {
        debug!(endpoint = %self.endpoint, model = %self.model, "텍스트 API 호출");
        self.complete(self.build_request_body(None, prompt)).await
    }

    fn provider_name(&self) -> &str {
        &self.model
    }
}

// ============================================================
// 테스트
// ============================================================
