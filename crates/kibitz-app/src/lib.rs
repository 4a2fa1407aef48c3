//! # kibitz-app
//!
//! 스케줄러, 수동 트리거, 영역 선택기와 이들을 묶는 사이클 오케스트레이션.
//! 바이너리(`kibitz`)는 이 crate의 컴포넌트를 어댑터와 와이어링한다.

pub mod chat;
pub mod console;
pub mod cycle;
pub mod event_bus;
pub mod lifecycle;
pub mod mode_store;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod selector;
