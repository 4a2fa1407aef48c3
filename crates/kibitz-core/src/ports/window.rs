//! 주 창 제어 포트.
//!
//! 영역 선택 중 주 창을 숨기고, 종료 시 이전 상태로 복원한다.

/// 주 창 가시성/스택 상태 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub visible: bool,
    pub topmost: bool,
}

/// 주 창 제어 인터페이스
pub trait WindowController: Send + Sync {
    /// 현재 상태
    fn state(&self) -> WindowState;

    /// 오버레이용으로 창 숨김 (최상위 해제 포함)
    fn hide_for_overlay(&self);

    /// 스냅샷 상태로 복원
    fn restore(&self, state: WindowState);
}
