//! 스크린 캡처.
//!
//! xcap 기반 캡처. 전체 화면은 주 모니터, 영역은 영역 좌상단이 속한
//! 모니터를 캡처한 뒤 잘라낸다. 결과는 PNG로 인코딩한다.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use kibitz_core::error::CoreError;
use kibitz_core::models::capture_mode::CaptureMode;
use kibitz_core::models::region::RegionGeometry;
use kibitz_core::ports::capture::{CapturedImage, ScreenCapturer};
use tracing::debug;
use xcap::Monitor;

/// 모니터의 가상 데스크톱 상 위치 (논리 좌표)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// 스크린 캡처: xcap 기반 `ScreenCapturer` 구현
pub struct ScreenCapture;

impl ScreenCapture {
    /// 새 캡처 인스턴스 생성
    pub fn new() -> Self {
        Self
    }

    /// 주 모니터 스크린 캡처 (없으면 첫 번째 모니터)
    pub fn capture_primary(&self) -> Result<DynamicImage, CoreError> {
        let monitors = Monitor::all()
            .map_err(|e| CoreError::Capture(format!("모니터 목록 조회 실패: {e}")))?;

        let mut fallback = None;
        let mut primary = None;
        for monitor in monitors {
            if monitor.is_primary().unwrap_or(false) {
                primary = Some(monitor);
                break;
            }
            if fallback.is_none() {
                fallback = Some(monitor);
            }
        }
        let monitor = primary
            .or(fallback)
            .ok_or_else(|| CoreError::Capture("모니터를 찾을 수 없음".to_string()))?;

        let image = monitor
            .capture_image()
            .map_err(|e| CoreError::Capture(format!("스크린 캡처 실패: {e}")))?;

        debug!("전체 화면 캡처 완료: {}x{}", image.width(), image.height());
        Ok(DynamicImage::ImageRgba8(image))
    }

    /// 영역 캡처: 영역 좌상단이 속한 모니터 기준으로 잘라냄
    pub fn capture_region(&self, region: RegionGeometry) -> Result<DynamicImage, CoreError> {
        let monitor = Monitor::from_point(region.x, region.y).map_err(|e| {
            CoreError::Capture(format!("영역 {region}을 포함하는 모니터 없음: {e}"))
        })?;
        let bounds = monitor_bounds(&monitor)?;

        let image = monitor
            .capture_image()
            .map_err(|e| CoreError::Capture(format!("스크린 캡처 실패: {e}")))?;

        let cropped = crop_to_region(&DynamicImage::ImageRgba8(image), bounds, region)?;
        debug!(
            "영역 캡처 완료: {region} → {}x{}",
            cropped.width(),
            cropped.height()
        );
        Ok(cropped)
    }
}

impl Default for ScreenCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenCapturer for ScreenCapture {
    fn capture(&self, mode: CaptureMode) -> Result<CapturedImage, CoreError> {
        let image = match mode {
            CaptureMode::FullScreen => self.capture_primary()?,
            CaptureMode::Region(region) => self.capture_region(region)?,
        };
        encode_png(&image)
    }
}

fn monitor_bounds(monitor: &Monitor) -> Result<MonitorBounds, CoreError> {
    let err = |e: xcap::XCapError| CoreError::Capture(format!("모니터 정보 조회 실패: {e}"));
    Ok(MonitorBounds {
        x: monitor.x().map_err(err)?,
        y: monitor.y().map_err(err)?,
        width: monitor.width().map_err(err)?,
        height: monitor.height().map_err(err)?,
    })
}

/// 모니터 캡처 이미지에서 영역 부분만 잘라냄.
///
/// 영역은 가상 데스크톱 좌표, 이미지는 물리 픽셀일 수 있으므로
/// 모니터 논리 크기 대비 배율을 적용한다. 모니터 밖으로 나간 부분은 잘린다.
pub fn crop_to_region(
    image: &DynamicImage,
    monitor: MonitorBounds,
    region: RegionGeometry,
) -> Result<DynamicImage, CoreError> {
    if monitor.width == 0 || monitor.height == 0 {
        return Err(CoreError::Capture("모니터 크기가 0".to_string()));
    }

    let left = (region.x as i64 - monitor.x as i64).max(0);
    let top = (region.y as i64 - monitor.y as i64).max(0);
    let right = (region.right() - monitor.x as i64).min(monitor.width as i64);
    let bottom = (region.bottom() - monitor.y as i64).min(monitor.height as i64);

    if right <= left || bottom <= top {
        return Err(CoreError::Capture(format!(
            "영역 {region}이 모니터 범위를 벗어남"
        )));
    }

    let scale_x = image.width() as f64 / monitor.width as f64;
    let scale_y = image.height() as f64 / monitor.height as f64;

    let px = (left as f64 * scale_x).round() as u32;
    let py = (top as f64 * scale_y).round() as u32;
    let pw = (((right - left) as f64 * scale_x).round() as u32).min(image.width().saturating_sub(px));
    let ph = (((bottom - top) as f64 * scale_y).round() as u32).min(image.height().saturating_sub(py));

    if pw == 0 || ph == 0 {
        return Err(CoreError::Capture(format!("영역 {region} 크롭 결과가 비어 있음")));
    }

    Ok(image.crop_imm(px, py, pw, ph))
}

/// PNG 인코딩
pub fn encode_png(image: &DynamicImage) -> Result<CapturedImage, CoreError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| CoreError::Capture(format!("PNG 인코딩 실패: {e}")))?;

    Ok(CapturedImage {
        width: image.width(),
        height: image.height(),
        png: buf.into_inner(),
    })
}
