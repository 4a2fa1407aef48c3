//! # kibitz-vision
//!
//! 화면 캡처 크레이트.
//! xcap 기반 전체 화면/영역 캡처와, 스케줄러 틱마다 발화 여부를
//! 결정하는 정책을 담당한다.

pub mod capture;
pub mod trigger;
