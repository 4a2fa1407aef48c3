//! 설정 파일 관리.
//!
//! 플랫폼별 설정 디렉토리에 JSON 파일로 설정을 저장/로드한다.
//! 파일이 손상되어도 기동은 실패하지 않는다 (기본값으로 대체).

use crate::config::AppConfig;
use crate::error::CoreError;
use directories::ProjectDirs;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.json";

/// 앱 디렉토리 이름
const APP_DIR_NAME: &str = "kibitz";

/// API 키 환경 변수
pub const API_KEY_ENV: &str = "KIBITZ_API_KEY";

/// 설정 관리자
///
/// 설정 파일의 로드/저장 및 런타임 설정 변경을 관리한다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
    config_path: PathBuf,
}

impl ConfigManager {
    /// 플랫폼 기본 경로로 설정 관리자 생성
    pub fn new() -> Result<Self, CoreError> {
        let config_path = Self::config_dir()?.join(CONFIG_FILE_NAME);
        Self::with_path(config_path)
    }

    /// 지정된 경로로 설정 관리자 생성
    ///
    /// 파일이 없으면 기본 설정을 저장한다. 파일을 읽거나 파싱할 수 없으면
    /// 경고만 남기고 기본 설정으로 시작한다 (원본 파일은 덮어쓰지 않음).
    pub fn with_path(config_path: PathBuf) -> Result<Self, CoreError> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    CoreError::Config(format!(
                        "설정 디렉토리 생성 실패: {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
                info!("설정 디렉토리 생성: {}", parent.display());
            }
        }

        let config = if config_path.exists() {
            Self::load_lenient(&config_path)
        } else {
            let default_config = AppConfig::default_config();
            if let Err(e) = Self::save_to_file(&config_path, &default_config) {
                warn!("기본 설정 파일 저장 실패: {e}");
            } else {
                info!("기본 설정 파일 생성: {}", config_path.display());
            }
            default_config
        };

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// 현재 설정 반환 (복제본)
    pub fn get(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// 설정 업데이트 및 파일 저장
    ///
    /// 메모리 값은 저장 실패와 무관하게 먼저 반영된다.
    pub fn update(&self, new_config: AppConfig) -> Result<(), CoreError> {
        *self.config.write() = new_config.clone();

        Self::save_to_file(&self.config_path, &new_config)?;
        debug!("설정 저장 완료: {}", self.config_path.display());
        Ok(())
    }

    /// 특정 필드만 업데이트
    pub fn update_with<F>(&self, updater: F) -> Result<AppConfig, CoreError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.get();
        updater(&mut config);
        self.update(config.clone())?;
        Ok(config)
    }

    /// 설정 파일 경로 반환
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 설정 다시 로드
    pub fn reload(&self) {
        let config = Self::load_lenient(&self.config_path);
        *self.config.write() = config;
        info!("설정 다시 로드 완료");
    }

    /// 플랫폼별 설정 디렉토리 경로
    ///
    /// - macOS: `~/Library/Application Support/com.kibitz.kibitz/`
    /// - Windows: `%APPDATA%\kibitz\kibitz\config\`
    /// - Linux: `~/.config/kibitz/`
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        Self::project_dirs()
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| CoreError::Config("홈 디렉토리를 찾을 수 없습니다".to_string()))
    }

    /// 데이터 디렉토리 경로 (일기 파일 등)
    pub fn data_dir() -> Result<PathBuf, CoreError> {
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| CoreError::Config("홈 디렉토리를 찾을 수 없습니다".to_string()))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", APP_DIR_NAME, APP_DIR_NAME)
    }

    /// 파일에서 설정 로드: 실패 시 기본값
    fn load_lenient(path: &Path) -> AppConfig {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("설정 파일 읽기 실패, 기본값 사용: {}: {}", path.display(), e);
                return AppConfig::default_config();
            }
        };

        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => {
                debug!("설정 파일 로드 완료: {}", path.display());
                AppConfig::from_json_lenient(&value)
            }
            Err(e) => {
                warn!("설정 파일 파싱 실패, 기본값 사용: {}: {}", path.display(), e);
                AppConfig::default_config()
            }
        }
    }

    /// 파일에 설정 저장
    fn save_to_file(path: &Path, config: &AppConfig) -> Result<(), CoreError> {
        let content = serde_json::to_string_pretty(config)
            .map_err(|e| CoreError::Config(format!("설정 직렬화 실패: {}", e)))?;

        fs::write(path, content).map_err(|e| {
            CoreError::Config(format!("설정 파일 저장 실패: {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}

impl AppConfig {
    /// 환경 변수 오버라이드 적용 (`KIBITZ_API_KEY`).
    ///
    /// 런타임 복제본에만 적용하고 파일에는 저장하지 않는다.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.vision_api.api_key = key.trim().to_string();
            }
        }
        self
    }
}
