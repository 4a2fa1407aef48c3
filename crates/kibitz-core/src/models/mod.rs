//! Kibitz 도메인 모델.
//!
//! 캡처 영역, 캡처 모드, 분석 사이클 상태를 정의한다.

pub mod capture_mode;
pub mod cycle;
pub mod region;
