//! 영역 선택기.
//!
//! 포인터 down/move/up 및 취소 이벤트로 구동되는 상태 기계.
//! 한 번에 하나의 세션만 열 수 있고, 세션은 일회용이다.
//! 세션이 열려 있는 동안 주 창은 숨겨지며, 어떤 경로로 끝나든 복원된다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kibitz_core::error::{CoreError, RejectReason};
use kibitz_core::models::region::{Point, RegionGeometry};
use kibitz_core::ports::window::{WindowController, WindowState};
use tracing::{debug, info};

/// 선택 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Completed(RegionGeometry),
    Cancelled(RejectReason),
}

/// 완료 콜백: 세션당 정확히 한 번 호출
pub type SelectionCallback = Box<dyn FnOnce(SelectionOutcome) + Send>;

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Idle,
    Selecting { anchor: Point, current: Point },
}

/// 선택기: 세션 발급 및 동시 세션 차단
pub struct RegionSelector {
    window: Arc<dyn WindowController>,
    active: Arc<AtomicBool>,
}

impl RegionSelector {
    pub fn new(window: Arc<dyn WindowController>) -> Self {
        Self {
            window,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 새 선택 세션 시작. 이미 열린 세션이 있으면 `Busy`.
    pub fn begin(&self, on_finish: SelectionCallback) -> Result<SelectionSession, CoreError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("선택 세션이 이미 열려 있음");
            return Err(CoreError::Busy);
        }

        info!("영역 선택 시작");
        Ok(SelectionSession {
            phase: SelectionPhase::Idle,
            overlay: Some(OverlayGuard::acquire(self.window.clone())),
            on_finish: Some(on_finish),
            active: self.active.clone(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// 오버레이 점유: 생성 시 창 상태 저장 후 숨김, 드롭 시 복원
pub struct OverlayGuard {
    window: Arc<dyn WindowController>,
    saved: WindowState,
}

impl OverlayGuard {
    pub fn acquire(window: Arc<dyn WindowController>) -> Self {
        let saved = window.state();
        window.hide_for_overlay();
        Self { window, saved }
    }
}

impl Drop for OverlayGuard {
    fn drop(&mut self) {
        self.window.restore(self.saved);
    }
}

/// 진행 중인 선택 세션
///
/// 종료 전에 드롭되면 `user_cancelled`로 종료된다.
pub struct SelectionSession {
    phase: SelectionPhase,
    overlay: Option<OverlayGuard>,
    on_finish: Option<SelectionCallback>,
    active: Arc<AtomicBool>,
}

impl SelectionSession {
    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.on_finish.is_none()
    }

    /// 미리보기용 사각형 (확정 아님)
    pub fn preview(&self) -> Option<(Point, Point)> {
        match self.phase {
            SelectionPhase::Selecting { anchor, current } => Some((anchor, current)),
            SelectionPhase::Idle => None,
        }
    }

    /// 드래그 시작. 이미 선택 중이면 기준점을 다시 잡는다.
    pub fn pointer_down(&mut self, p: Point) {
        if self.is_finished() {
            return;
        }
        self.phase = SelectionPhase::Selecting {
            anchor: p,
            current: p,
        };
    }

    pub fn pointer_move(&mut self, p: Point) {
        if let SelectionPhase::Selecting { current, .. } = &mut self.phase {
            *current = p;
        }
    }

    /// 드래그 종료: 영역 확정 또는 `too_small` 취소
    pub fn pointer_up(&mut self, p: Point) {
        let SelectionPhase::Selecting { anchor, .. } = self.phase else {
            return;
        };
        let outcome = match RegionGeometry::from_points(anchor, p) {
            Ok(geometry) => SelectionOutcome::Completed(geometry),
            Err(_) => SelectionOutcome::Cancelled(RejectReason::TooSmall),
        };
        self.finish(outcome);
    }

    /// 취소 신호 (Esc)
    pub fn cancel(&mut self) {
        self.finish(SelectionOutcome::Cancelled(RejectReason::UserCancelled));
    }

    fn finish(&mut self, outcome: SelectionOutcome) {
        let Some(on_finish) = self.on_finish.take() else {
            return;
        };
        self.phase = SelectionPhase::Idle;
        self.overlay = None;
        self.active.store(false, Ordering::Release);

        match outcome {
            SelectionOutcome::Completed(g) => info!("영역 선택 완료: {g}"),
            SelectionOutcome::Cancelled(reason) => info!("영역 선택 취소: {reason}"),
        }
        on_finish(outcome);
    }
}

impl Drop for SelectionSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeWindow {
        state: Mutex<Option<WindowState>>,
        hides: Mutex<u32>,
    }

    impl WindowController for FakeWindow {
        fn state(&self) -> WindowState {
            self.state.lock().unwrap_or(WindowState {
                visible: true,
                topmost: true,
            })
        }
        fn hide_for_overlay(&self) {
            *self.hides.lock() += 1;
            *self.state.lock() = Some(WindowState {
                visible: false,
                topmost: false,
            });
        }
        fn restore(&self, state: WindowState) {
            *self.state.lock() = Some(state);
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<SelectionOutcome>>>, SelectionCallback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, Box::new(move |o| sink.lock().push(o)))
    }

    fn visible_topmost() -> WindowState {
        WindowState {
            visible: true,
            topmost: true,
        }
    }

    #[test]
    fn drag_completes_with_normalized_geometry() {
        let window = Arc::new(FakeWindow::default());
        let selector = RegionSelector::new(window.clone());
        let (log, cb) = recorder();

        let mut session = selector.begin(cb).unwrap();
        assert!(!window.state().visible);
        session.pointer_down(Point::new(400, 300));
        session.pointer_move(Point::new(350, 250));
        assert_eq!(
            session.preview(),
            Some((Point::new(400, 300), Point::new(350, 250)))
        );
        session.pointer_up(Point::new(100, 100));

        assert_eq!(
            *log.lock(),
            vec![SelectionOutcome::Completed(RegionGeometry {
                x: 100,
                y: 100,
                width: 300,
                height: 200
            })]
        );
        assert_eq!(window.state(), visible_topmost());
        assert!(!selector.is_active());
    }

    #[test]
    fn tiny_drag_is_cancelled_too_small() {
        let window = Arc::new(FakeWindow::default());
        let selector = RegionSelector::new(window.clone());
        let (log, cb) = recorder();

        let mut session = selector.begin(cb).unwrap();
        session.pointer_down(Point::new(10, 10));
        session.pointer_up(Point::new(15, 200));

        assert_eq!(
            *log.lock(),
            vec![SelectionOutcome::Cancelled(RejectReason::TooSmall)]
        );
        assert_eq!(window.state(), visible_topmost());
    }

    #[test]
    fn escape_after_pointer_down_restores_window() {
        let window = Arc::new(FakeWindow::default());
        let selector = RegionSelector::new(window.clone());
        let (log, cb) = recorder();

        let mut session = selector.begin(cb).unwrap();
        session.pointer_down(Point::new(10, 10));
        session.cancel();

        assert_eq!(
            *log.lock(),
            vec![SelectionOutcome::Cancelled(RejectReason::UserCancelled)]
        );
        assert_eq!(window.state(), visible_topmost());
        assert_eq!(session.phase(), SelectionPhase::Idle);
    }

    #[test]
    fn events_after_finish_are_ignored() {
        let window = Arc::new(FakeWindow::default());
        let selector = RegionSelector::new(window);
        let (log, cb) = recorder();

        let mut session = selector.begin(cb).unwrap();
        session.cancel();
        session.pointer_down(Point::new(0, 0));
        session.pointer_up(Point::new(500, 500));
        session.cancel();
        drop(session);

        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn pointer_up_without_down_is_ignored() {
        let window = Arc::new(FakeWindow::default());
        let selector = RegionSelector::new(window);
        let (log, cb) = recorder();

        let mut session = selector.begin(cb).unwrap();
        session.pointer_up(Point::new(500, 500));
        assert!(log.lock().is_empty());
        assert!(!session.is_finished());
    }

    #[test]
    fn second_session_fails_fast_until_first_ends() {
        let window = Arc::new(FakeWindow::default());
        let selector = RegionSelector::new(window.clone());
        let (_log, cb) = recorder();
        let (_log2, cb2) = recorder();
        let (_log3, cb3) = recorder();

        let mut first = selector.begin(cb).unwrap();
        assert!(matches!(selector.begin(cb2), Err(CoreError::Busy)));
        assert_eq!(*window.hides.lock(), 1);

        first.cancel();
        assert!(selector.begin(cb3).is_ok());
    }

    #[test]
    fn dropping_open_session_cancels_and_restores() {
        let window = Arc::new(FakeWindow::default());
        let selector = RegionSelector::new(window.clone());
        let (log, cb) = recorder();

        {
            let mut session = selector.begin(cb).unwrap();
            session.pointer_down(Point::new(1, 1));
        }

        assert_eq!(
            *log.lock(),
            vec![SelectionOutcome::Cancelled(RejectReason::UserCancelled)]
        );
        assert_eq!(window.state(), visible_topmost());
        assert!(!selector.is_active());
    }

    #[test]
    fn hidden_window_is_restored_hidden() {
        let window = Arc::new(FakeWindow::default());
        let hidden = WindowState {
            visible: false,
            topmost: false,
        };
        window.restore(hidden);
        let selector = RegionSelector::new(window.clone());
        let (_log, cb) = recorder();

        let mut session = selector.begin(cb).unwrap();
        session.cancel();
        assert_eq!(window.state(), hidden);
    }
}
