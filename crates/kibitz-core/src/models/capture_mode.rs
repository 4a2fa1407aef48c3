//! 캡처 모드 모델.
//!
//! 전체 화면 또는 선택 영역: 항상 정확히 하나만 활성.

use serde::{Deserialize, Serialize};

use super::region::RegionGeometry;

/// 현재 활성 캡처 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// 주 모니터 전체
    #[default]
    FullScreen,
    /// 사용자가 선택한 영역
    Region(RegionGeometry),
}

impl CaptureMode {
    /// 영속 설정의 모드 식별자
    pub fn kind(&self) -> CaptureModeKind {
        match self {
            Self::FullScreen => CaptureModeKind::FullScreen,
            Self::Region(_) => CaptureModeKind::Region,
        }
    }

    /// 영역 모드일 때 지오메트리
    pub fn region(&self) -> Option<RegionGeometry> {
        match self {
            Self::FullScreen => None,
            Self::Region(g) => Some(*g),
        }
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullScreen => f.write_str("전체 화면"),
            Self::Region(g) => write!(f, "영역 {g}"),
        }
    }
}

/// 설정 파일의 `capture.mode` 값
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureModeKind {
    #[default]
    #[serde(rename = "fullscreen")]
    FullScreen,
    Region,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fullscreen() {
        assert_eq!(CaptureMode::default(), CaptureMode::FullScreen);
        assert_eq!(CaptureMode::default().region(), None);
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&CaptureModeKind::FullScreen).unwrap(),
            "\"fullscreen\""
        );
        assert_eq!(
            serde_json::to_string(&CaptureModeKind::Region).unwrap(),
            "\"region\""
        );
    }

    #[test]
    fn region_mode_exposes_geometry() {
        let g = RegionGeometry {
            x: 1,
            y: 2,
            width: 30,
            height: 40,
        };
        let mode = CaptureMode::Region(g);
        assert_eq!(mode.kind(), CaptureModeKind::Region);
        assert_eq!(mode.region(), Some(g));
    }
}
