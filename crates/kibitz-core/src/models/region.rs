//! 캡처 영역 지오메트리.
//!
//! 임의의 두 화면 좌표를 정규화된 직사각형으로 변환한다.
//! 좌상단 기준, 너비/높이는 항상 양수.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, RejectReason};

/// 선택 영역 최소 변 길이 (픽셀)
pub const MIN_REGION_SIZE: u32 = 10;

/// 화면 좌표 (멀티모니터 환경에서는 음수 가능)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// 확정된 캡처 영역: 생성 이후 불변.
///
/// `x`/`y`는 `i32`: 주 모니터 왼쪽/위에 놓인 보조 모니터에서는 음수가 된다.
/// 너비/높이는 항상 [`MIN_REGION_SIZE`] 이상.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl RegionGeometry {
    /// 두 점으로부터 영역 생성.
    ///
    /// `x = min(x1, x2)`, `width = |x2 - x1|` (y도 동일).
    /// 한 변이라도 [`MIN_REGION_SIZE`] 미만이면 `too_small`로 거부한다.
    /// 너비/높이 0은 임계값과 무관하게 항상 거부된다.
    pub fn from_points(p1: Point, p2: Point) -> Result<Self, CoreError> {
        let width = p1.x.abs_diff(p2.x);
        let height = p1.y.abs_diff(p2.y);

        if width == 0 || height == 0 || width < MIN_REGION_SIZE || height < MIN_REGION_SIZE {
            return Err(CoreError::SelectionRejected(RejectReason::TooSmall));
        }

        Ok(Self {
            x: p1.x.min(p2.x),
            y: p1.y.min(p2.y),
            width,
            height,
        })
    }

    /// 영속 설정에서 읽은 값 검증 (최소 크기 충족 여부)
    pub fn is_valid(&self) -> bool {
        self.width >= MIN_REGION_SIZE && self.height >= MIN_REGION_SIZE
    }

    /// 우측 경계 (배타적이지 않은 좌표, `x + width`)
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// 하단 경계 (`y + height`)
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// 점이 직사각형 경계선 위에 있는지
    pub fn on_boundary(&self, p: Point) -> bool {
        let (px, py) = (p.x as i64, p.y as i64);
        let (left, top) = (self.x as i64, self.y as i64);
        let inside = px >= left && px <= self.right() && py >= top && py <= self.bottom();
        let on_edge =
            px == left || px == self.right() || py == top || py == self.bottom();
        inside && on_edge
    }
}

impl std::fmt::Display for RegionGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected_too_small(result: Result<RegionGeometry, CoreError>) -> bool {
        matches!(
            result,
            Err(CoreError::SelectionRejected(RejectReason::TooSmall))
        )
    }

    #[test]
    fn normalizes_reversed_points() {
        let g = RegionGeometry::from_points(Point::new(300, 250), Point::new(100, 50)).unwrap();
        assert_eq!(
            g,
            RegionGeometry {
                x: 100,
                y: 50,
                width: 200,
                height: 200
            }
        );
    }

    #[test]
    fn exact_minimum_is_accepted() {
        let g = RegionGeometry::from_points(Point::new(0, 0), Point::new(10, 10)).unwrap();
        assert_eq!((g.width, g.height), (10, 10));
    }

    #[test]
    fn below_minimum_is_rejected() {
        assert!(rejected_too_small(RegionGeometry::from_points(
            Point::new(0, 0),
            Point::new(9, 400)
        )));
        assert!(rejected_too_small(RegionGeometry::from_points(
            Point::new(0, 0),
            Point::new(400, 9)
        )));
    }

    #[test]
    fn zero_extent_is_always_rejected() {
        assert!(rejected_too_small(RegionGeometry::from_points(
            Point::new(50, 50),
            Point::new(50, 500)
        )));
        assert!(rejected_too_small(RegionGeometry::from_points(
            Point::new(5, 5),
            Point::new(5, 5)
        )));
    }

    #[test]
    fn large_pairs_keep_both_points_on_boundary() {
        let coords = [-1920, -37, 0, 13, 640, 1919, 3839];
        for &x1 in &coords {
            for &x2 in &coords {
                for &y1 in &coords {
                    for &y2 in &coords {
                        let (p1, p2) = (Point::new(x1, y1), Point::new(x2, y2));
                        let result = RegionGeometry::from_points(p1, p2);
                        if x1.abs_diff(x2) >= MIN_REGION_SIZE && y1.abs_diff(y2) >= MIN_REGION_SIZE
                        {
                            let g = result.unwrap();
                            assert!(g.on_boundary(p1), "{p1:?} not on {g}");
                            assert!(g.on_boundary(p2), "{p2:?} not on {g}");
                        } else {
                            assert!(rejected_too_small(result));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let g = RegionGeometry::from_points(Point::new(i32::MIN, i32::MIN), Point::new(i32::MAX, i32::MAX))
            .unwrap();
        assert_eq!(g.width, u32::MAX);
        assert_eq!(g.x, i32::MIN);
    }

    #[test]
    fn serde_shape() {
        let g = RegionGeometry {
            x: 10,
            y: 20,
            width: 300,
            height: 200,
        };
        let json = serde_json::to_value(g).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"x": 10, "y": 20, "width": 300, "height": 200})
        );
    }
}
