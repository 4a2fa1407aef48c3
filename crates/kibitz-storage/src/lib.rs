//! # kibitz-storage
//!
//! 로컬 저장소 어댑터.
//! 분석 결과를 날짜별 텍스트 일기 파일에 누적 기록하고,
//! 목록 조회/읽기/내보내기를 제공한다.

pub mod diary;
