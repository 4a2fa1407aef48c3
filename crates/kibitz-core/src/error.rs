//! Kibitz 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 이 타입을 그대로 반환하거나 `#[from]`으로 래핑한다.

use thiserror::Error;

/// 영역 선택 거부 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// 너비 또는 높이가 최소 크기 미만
    TooSmall,
    /// 사용자가 선택을 취소함 (ESC, 세션 해제)
    UserCancelled,
}

impl RejectReason {
    /// 와이어/로그용 식별자
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooSmall => "too_small",
            Self::UserCancelled => "user_cancelled",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 영역 선택 거부 (치명적이지 않음: 선택기는 Idle로 복귀)
    #[error("영역 선택 거부: {0}")]
    SelectionRejected(RejectReason),

    /// 이미 분석 사이클이 진행 중 (대기열 없음)
    #[error("분석 사이클 진행 중")]
    Busy,

    /// 화면 캡처 실패
    #[error("캡처 에러: {0}")]
    Capture(String),

    /// 비전 추론 실패
    #[error("추론 에러: {0}")]
    Inference(String),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Diary")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}
