//! 일기(로그) 저장소 포트.
//!
//! 구현: `kibitz-storage` crate (날짜별 텍스트 파일)

use async_trait::async_trait;

use crate::error::CoreError;

/// 날짜 키 기반 append-or-create 텍스트 로그
#[async_trait]
pub trait DiaryStore: Send + Sync {
    /// `date_key`(YYYY-MM-DD) 일기에 레코드 추가. 없으면 생성.
    async fn append_record(&self, date_key: &str, text: &str) -> Result<(), CoreError>;
}
