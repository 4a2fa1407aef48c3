//! 화면 픽셀 소스 포트.
//!
//! 구현: `kibitz-vision` crate (xcap, image)

use crate::error::CoreError;
use crate::models::capture_mode::CaptureMode;

/// 캡처된 이미지 (PNG 인코딩 완료)
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// 픽셀 너비
    pub width: u32,
    /// 픽셀 높이
    pub height: u32,
    /// PNG 바이트
    pub png: Vec<u8>,
}

/// 화면 캡처: 주어진 모드의 픽셀을 반환.
///
/// 플랫폼 캡처는 블로킹 호출이므로 호출자는 `spawn_blocking`에서 실행한다.
pub trait ScreenCapturer: Send + Sync {
    fn capture(&self, mode: CaptureMode) -> Result<CapturedImage, CoreError>;
}
