//! 일기 파일 저장소.
//!
//! 날짜별 텍스트 파일에 분석 결과를 누적 기록한다.
//! 구조: `<base_dir>/diary_YYYY-MM-DD.txt`

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use kibitz_core::error::CoreError;
use kibitz_core::ports::diary::DiaryStore;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 일기 파일 접두사
const FILE_PREFIX: &str = "diary_";

/// 일기 파일 확장자
const FILE_EXT: &str = ".txt";

/// 날짜 키 형식
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// 날짜별 일기 파일 저장소: `DiaryStore` 포트 구현
pub struct DiaryFileStorage {
    base_dir: PathBuf,
    /// 쓰기 직렬화 (헤더 생성과 추가가 섞이지 않도록)
    write_lock: Mutex<()>,
}

impl DiaryFileStorage {
    /// 새 일기 저장소 생성 (디렉토리가 없으면 생성)
    pub async fn new(base_dir: PathBuf) -> Result<Self, CoreError> {
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| CoreError::Internal(format!("일기 디렉토리 생성 실패: {e}")))?;

        info!("일기 저장소 초기화: {}", base_dir.display());

        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// 저장 디렉토리
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 오늘 날짜 키 (로컬 시간)
    pub fn today_key() -> String {
        Local::now().format(DATE_KEY_FORMAT).to_string()
    }

    /// 지정 시각으로 레코드 추가
    pub async fn append_record_at(
        &self,
        date_key: &str,
        text: &str,
        at: NaiveDateTime,
    ) -> Result<PathBuf, CoreError> {
        let path = self.path_for(date_key)?;
        let _guard = self.write_lock.lock().await;

        let is_new = !fs::try_exists(&path).await?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| CoreError::Internal(format!("일기 파일 열기 실패: {e}")))?;

        let mut content = String::new();
        if is_new {
            content.push_str(&format!("제목: 게임 일기_{date_key}\n날짜: {date_key}\n\n"));
        }
        content.push_str(&format!("\n[{}] {}\n", at.format("%Y-%m-%d %H:%M:%S"), text));

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| CoreError::Internal(format!("일기 기록 실패: {e}")))?;
        file.flush().await?;

        debug!(
            "일기 기록: {} ({} chars, new={})",
            path.display(),
            text.chars().count(),
            is_new
        );
        Ok(path)
    }

    /// 기록된 날짜 키 목록 (최신순)
    pub async fn list_dates(&self) -> Result<Vec<String>, CoreError> {
        let mut entries = fs::read_dir(&self.base_dir).await?;
        let mut dates = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(key) = name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_EXT))
            else {
                continue;
            };
            if parse_date_key(key).is_ok() {
                dates.push(key.to_string());
            }
        }

        dates.sort_unstable_by(|a, b| b.cmp(a));
        Ok(dates)
    }

    /// 일기 전체 내용 읽기
    pub async fn read(&self, date_key: &str) -> Result<String, CoreError> {
        let path = self.path_for(date_key)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CoreError::NotFound {
                resource_type: "diary".to_string(),
                id: date_key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// 일기를 다른 경로로 내보내기
    pub async fn export(&self, date_key: &str, dest: &Path) -> Result<u64, CoreError> {
        let content = self.read(date_key).await?;
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(dest, content.as_bytes()).await?;
        info!("일기 내보내기: {} → {}", date_key, dest.display());
        Ok(content.len() as u64)
    }

    fn path_for(&self, date_key: &str) -> Result<PathBuf, CoreError> {
        parse_date_key(date_key)?;
        Ok(self
            .base_dir
            .join(format!("{FILE_PREFIX}{date_key}{FILE_EXT}")))
    }
}

/// `YYYY-MM-DD` 형식 검증 (0 패딩 필수)
fn parse_date_key(date_key: &str) -> Result<NaiveDate, CoreError> {
    let invalid = || CoreError::Validation {
        field: "date_key".to_string(),
        message: format!("YYYY-MM-DD 형식이 아님: {date_key}"),
    };
    if date_key.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(date_key, DATE_KEY_FORMAT).map_err(|_| invalid())
}

#[async_trait]
impl DiaryStore for DiaryFileStorage {
    async fn append_record(&self, date_key: &str, text: &str) -> Result<(), CoreError> {
        self.append_record_at(date_key, text, Local::now().naive_local())
            .await
            .map(|_| ())
    }
}
