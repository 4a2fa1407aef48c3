//! 애플리케이션 설정 구조체.
//!
//! 캡처 모드/영역, 발화 정책, 모니터링 주기, 비전 API, 프롬프트, 일기 설정.
//! `ConfigManager`가 JSON 파일에서 로드하며, 잘못된 섹션/값은 기본값으로 대체한다.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::models::capture_mode::{CaptureMode, CaptureModeKind};
use crate::models::region::RegionGeometry;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 캡처 모드 + 선택 영역
    #[serde(default)]
    pub capture: CaptureSettings,
    /// 발화 정책 (확률 + 침묵 타임아웃)
    #[serde(default)]
    pub trigger: TriggerConfig,
    /// 모니터링 루프 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 비전 추론 API 설정
    #[serde(default)]
    pub vision_api: VisionApiConfig,
    /// 프롬프트 설정
    #[serde(default)]
    pub prompt: PromptConfig,
    /// 일기 설정
    #[serde(default)]
    pub diary: DiaryConfig,
}

// ============================================================
// 캡처 설정
// ============================================================

/// 영속 캡처 설정: `mode: "fullscreen" | "region"`, `region: {..} | null`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    #[serde(default)]
    pub mode: CaptureModeKind,
    #[serde(default)]
    pub region: Option<RegionGeometry>,
}

impl CaptureSettings {
    /// 활성 모드 → 영속 레코드
    pub fn from_mode(mode: CaptureMode) -> Self {
        Self {
            mode: mode.kind(),
            region: mode.region(),
        }
    }

    /// 영속 레코드 → 활성 모드.
    ///
    /// 영역 모드인데 영역이 없거나 최소 크기 미만이면 전체 화면.
    pub fn capture_mode(&self) -> CaptureMode {
        match (self.mode, self.region) {
            (CaptureModeKind::Region, Some(region)) if region.is_valid() => {
                CaptureMode::Region(region)
            }
            _ => CaptureMode::FullScreen,
        }
    }
}

// ============================================================
// 발화 정책 설정
// ============================================================

/// 발화 정책: 매 틱 확률 추첨 또는 침묵 타임아웃
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// 틱마다 발화할 확률 (0-100, 0이면 확률 발화 비활성).
    /// 범위를 벗어난 정수는 섹션 전체를 버리지 않고 0..=100으로 잘라낸다.
    #[serde(
        default = "default_random_probability_percent",
        deserialize_with = "deserialize_percent"
    )]
    pub random_probability_percent: u8,
    /// 마지막 발화 후 강제 발화까지의 시간 (초, > 0)
    #[serde(default = "default_silence_timeout_secs")]
    pub silence_timeout_secs: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            random_probability_percent: default_random_probability_percent(),
            silence_timeout_secs: default_silence_timeout_secs(),
        }
    }
}

impl TriggerConfig {
    /// 침묵 타임아웃을 Duration으로 반환
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_secs(self.silence_timeout_secs)
    }
}

fn default_random_probability_percent() -> u8 {
    15
}

fn default_silence_timeout_secs() -> u64 {
    30
}

/// 임의의 정수를 0..=100으로 보정해 읽는다
fn deserialize_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    let clamped = raw.clamp(0, 100);
    if clamped != raw {
        warn!("설정값 보정: trigger.random_probability_percent {raw} -> {clamped}");
    }
    Ok(clamped as u8)
}

// ============================================================
// 모니터링 설정
// ============================================================

/// 모니터링 루프 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 틱 간격 (초)
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// 앱 시작 시 모니터링 자동 시작
    #[serde(default)]
    pub auto_start: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            auto_start: false,
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    5
}

// ============================================================
// 비전 API 설정
// ============================================================

/// AI 제공자 타입: 요청/응답 형식 및 인증 헤더 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AiProviderType {
    /// Anthropic Claude API: `x-api-key` 헤더 + `/v1/messages` 형식
    Anthropic,
    /// OpenAI 호환 API: `Authorization: Bearer` 헤더 + `/chat/completions` 형식
    #[default]
    OpenAi,
}

/// 비전 추론 API 엔드포인트
///
/// API 키는 config.json에 저장하거나 `KIBITZ_API_KEY` 환경 변수로 전달한다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionApiConfig {
    /// API URL (예: "https://openrouter.ai/api/v1/chat/completions")
    #[serde(default = "default_api_endpoint")]
    pub endpoint: String,
    /// API 키
    #[serde(default)]
    pub api_key: String,
    /// 모델 이름
    #[serde(default = "default_api_model")]
    pub model: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    /// 응답 최대 토큰
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 요청/응답 형식
    #[serde(default)]
    pub provider_type: AiProviderType,
}

impl Default for VisionApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_api_endpoint(),
            api_key: String::new(),
            model: default_api_model(),
            timeout_secs: default_api_timeout_secs(),
            max_tokens: default_max_tokens(),
            provider_type: AiProviderType::default(),
        }
    }
}

fn default_api_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_api_model() -> String {
    "openai/gpt-4o".to_string()
}

fn default_api_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    500
}

// ============================================================
// 프롬프트 설정
// ============================================================

/// 프롬프트 설정: 페르소나 + 사이클 종류별 지시문
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// 공통 페르소나
    #[serde(default = "default_persona")]
    pub persona: String,
    /// 스케줄 발화용 지시문 (짧은 코멘트)
    #[serde(default = "default_scheduled_instruction")]
    pub scheduled_instruction: String,
    /// 수동 실행용 지시문 (상세 분석)
    #[serde(default = "default_manual_instruction")]
    pub manual_instruction: String,
    /// 사용자 대화용 지시문 (텍스트 전용)
    #[serde(default = "default_chat_instruction")]
    pub chat_instruction: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            scheduled_instruction: default_scheduled_instruction(),
            manual_instruction: default_manual_instruction(),
            chat_instruction: default_chat_instruction(),
        }
    }
}

fn default_persona() -> String {
    "당신은 유머러스한 게임 해설자입니다. 게임 화면과 플레이어의 조작에 대해 \
     가볍고 유쾌한 톤으로 코멘트하고, 가끔 농담도 섞어 주세요."
        .to_string()
}

fn default_scheduled_instruction() -> String {
    "이 게임 화면을 보고 짧게 한두 문장으로 코멘트해 주세요.".to_string()
}

fn default_manual_instruction() -> String {
    "이 게임 화면을 자세히 분석하고, 보이는 내용과 당신의 생각을 설명해 주세요.".to_string()
}

fn default_chat_instruction() -> String {
    "사용자에게 답해 주세요. 게임 화면에 대한 질문이면 화면 분석(now)을 권해도 됩니다.".to_string()
}

// ============================================================
// 일기 설정
// ============================================================

/// 일기(분석 기록) 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryConfig {
    /// 성공한 분석 결과를 일기에 자동 기록
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 일기 디렉토리 (None이면 데이터 디렉토리 하위 `diary`)
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for DiaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

fn default_true() -> bool {
    true
}

// ============================================================
// 로드/검증
// ============================================================

impl AppConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self {
            capture: CaptureSettings::default(),
            trigger: TriggerConfig::default(),
            monitor: MonitorConfig::default(),
            vision_api: VisionApiConfig::default(),
            prompt: PromptConfig::default(),
            diary: DiaryConfig::default(),
        }
    }

    /// JSON 값에서 섹션 단위로 관대하게 로드.
    ///
    /// 섹션이 없거나 형식이 잘못되면 해당 섹션만 기본값으로 대체하고,
    /// 이후 [`AppConfig::sanitize`]로 범위를 보정한다.
    pub fn from_json_lenient(value: &serde_json::Value) -> Self {
        let mut config = Self {
            capture: section(value, "capture"),
            trigger: section(value, "trigger"),
            monitor: section(value, "monitor"),
            vision_api: section(value, "vision_api"),
            prompt: section(value, "prompt"),
            diary: section(value, "diary"),
        };
        config.sanitize();
        config
    }

    /// 범위를 벗어난 값을 보정. 보정한 필드 이름 목록을 반환한다.
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let mut repaired = Vec::new();

        if self.trigger.random_probability_percent > 100 {
            self.trigger.random_probability_percent = 100;
            repaired.push("trigger.random_probability_percent");
        }
        if self.trigger.silence_timeout_secs == 0 {
            self.trigger.silence_timeout_secs = default_silence_timeout_secs();
            repaired.push("trigger.silence_timeout_secs");
        }
        if self.monitor.tick_interval_secs == 0 {
            self.monitor.tick_interval_secs = default_tick_interval_secs();
            repaired.push("monitor.tick_interval_secs");
        }

        let normalized = CaptureSettings::from_mode(self.capture.capture_mode());
        if normalized != self.capture {
            if normalized.mode != self.capture.mode {
                repaired.push("capture.region");
            }
            self.capture = normalized;
        }

        for field in &repaired {
            warn!("설정값 보정: {field}");
        }
        repaired
    }

    /// 틱 간격을 Duration으로 반환
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.tick_interval_secs)
    }

    /// API 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.vision_api.timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// 섹션 하나를 역직렬화, 실패 시 기본값
fn section<T: DeserializeOwned + Default>(root: &serde_json::Value, key: &str) -> T {
    match root.get(key) {
        None | Some(serde_json::Value::Null) => T::default(),
        Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
            warn!("설정 섹션 '{key}' 파싱 실패, 기본값 사용: {e}");
            T::default()
        }),
    }
}
