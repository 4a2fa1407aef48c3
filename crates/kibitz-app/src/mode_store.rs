//! 캡처 모드 저장소.
//!
//! 활성 캡처 모드를 메모리에 유지하고 설정 파일에 영속화한다.
//! 사이클은 시작 시 모드 전체를 한 번 읽으므로, 전환은 다음 사이클부터 적용된다.

use kibitz_core::config::CaptureSettings;
use kibitz_core::config_manager::ConfigManager;
use kibitz_core::error::{CoreError, RejectReason};
use kibitz_core::models::capture_mode::CaptureMode;
use kibitz_core::models::region::RegionGeometry;
use kibitz_core::ports::cycle::CaptureModeProvider;
use parking_lot::RwLock;
use tracing::{info, warn};

/// 캡처 모드 저장소
pub struct CaptureModeStore {
    mode: RwLock<CaptureMode>,
    config: Option<ConfigManager>,
}

impl CaptureModeStore {
    /// 설정 파일에서 복원
    pub fn load(config: ConfigManager) -> Self {
        let mode = config.get().capture.capture_mode();
        info!("캡처 모드 복원: {mode}");
        Self {
            mode: RwLock::new(mode),
            config: Some(config),
        }
    }

    /// 영속화 없이 메모리에만 유지
    pub fn in_memory(mode: CaptureMode) -> Self {
        Self {
            mode: RwLock::new(mode),
            config: None,
        }
    }

    /// 전체 화면으로 전환
    pub fn switch_to_full_screen(&self) -> Result<(), CoreError> {
        self.switch(CaptureMode::FullScreen)
    }

    /// 선택 영역으로 전환. 최소 크기 미만이면 거부.
    pub fn switch_to_region(&self, region: RegionGeometry) -> Result<(), CoreError> {
        if !region.is_valid() {
            return Err(CoreError::SelectionRejected(RejectReason::TooSmall));
        }
        self.switch(CaptureMode::Region(region))
    }

    /// 메모리 값은 즉시 반영, 저장 실패는 경고 후 에러로 반환
    fn switch(&self, mode: CaptureMode) -> Result<(), CoreError> {
        *self.mode.write() = mode;
        info!("캡처 모드 전환: {mode}");

        if let Some(config) = &self.config {
            config
                .update_with(|c| c.capture = CaptureSettings::from_mode(mode))
                .map_err(|e| {
                    warn!("캡처 모드 저장 실패: {e}");
                    e
                })?;
        }
        Ok(())
    }
}

impl CaptureModeProvider for CaptureModeStore {
    fn current_mode(&self) -> CaptureMode {
        *self.mode.read()
    }
}
