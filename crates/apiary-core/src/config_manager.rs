//! 설정 파일 관리.
//!
//! `config.json` 하나를 플랫폼 설정 디렉토리(또는 `--config` 경로)에 두고
//! CLI 시작 시 읽는다. `apiary config set`이 유일한 쓰기 경로다.

use crate::config::AppConfig;
use crate::error::CoreError;
use directories::ProjectDirs;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.json";

/// 설정 파일 관리자
#[derive(Debug)]
pub struct ConfigManager {
    path: PathBuf,
    current: RwLock<AppConfig>,
}

impl ConfigManager {
    /// 플랫폼 설정 디렉토리의 `config.json`
    pub fn new() -> Result<Self, CoreError> {
        let dirs = project_dirs()?;
        Self::with_path(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// 지정 경로의 설정 파일 사용 (없으면 기본값으로 생성)
    pub fn with_path(path: PathBuf) -> Result<Self, CoreError> {
        let current = match fs::read_to_string(&path) {
            Ok(content) => parse(&path, &content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let defaults = AppConfig::default_config();
                write_config(&path, &defaults)?;
                info!("기본 설정 파일 생성: {}", path.display());
                defaults
            }
            Err(e) => {
                return Err(CoreError::Config(format!(
                    "설정 파일 읽기 실패: {}: {e}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    /// 현재 설정 (복제본)
    pub fn get(&self) -> AppConfig {
        self.current.read().clone()
    }

    /// 설정 파일 경로
    pub fn config_path(&self) -> &Path {
        &self.path
    }

    /// 설정 일부 변경: 검증 후 파일에 쓰고 나서야 메모리에 반영
    pub fn update_with<F>(&self, updater: F) -> Result<AppConfig, CoreError>
    where
        F: FnOnce(&mut AppConfig) -> Result<(), CoreError>,
    {
        let mut next = self.get();
        updater(&mut next)?;
        next.validate()?;
        write_config(&self.path, &next)?;
        *self.current.write() = next.clone();
        debug!("설정 저장: {}", self.path.display());
        Ok(next)
    }

    /// 데이터 디렉토리 (히스토리 문서, 백업, 임베디드 DB)
    ///
    /// - macOS: `~/Library/Application Support/dev.apiary.apiary/`
    /// - Linux: `~/.local/share/apiary/`
    pub fn data_dir() -> Result<PathBuf, CoreError> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }
}

fn project_dirs() -> Result<ProjectDirs, CoreError> {
    ProjectDirs::from("dev", "apiary", "apiary")
        .ok_or_else(|| CoreError::Config("홈 디렉토리를 찾을 수 없습니다".to_string()))
}

fn parse(path: &Path, content: &str) -> Result<AppConfig, CoreError> {
    let config: AppConfig = serde_json::from_str(content).map_err(|e| {
        CoreError::Config(format!("설정 파일 파싱 실패: {}: {e}", path.display()))
    })?;
    config.validate()?;
    debug!("설정 파일 로드: {}", path.display());
    Ok(config)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), CoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            CoreError::Config(format!("설정 디렉토리 생성 실패: {}: {e}", parent.display()))
        })?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)
        .map_err(|e| CoreError::Config(format!("설정 파일 저장 실패: {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let manager = ConfigManager::with_path(path.clone()).unwrap();
        assert!(path.exists());
        assert_eq!(manager.get(), AppConfig::default_config());
        assert_eq!(manager.config_path(), path.as_path());
    }

    #[test]
    fn set_value_is_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let manager = ConfigManager::with_path(path.clone()).unwrap();
        manager
            .update_with(|c| c.set_value("server.base_url", "http://10.0.0.2:4000/api"))
            .unwrap();

        let reopened = ConfigManager::with_path(path).unwrap();
        assert_eq!(reopened.get().server.base_url, "http://10.0.0.2:4000/api");
    }

    #[test]
    fn invalid_update_leaves_file_and_memory_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        let manager = ConfigManager::with_path(path.clone()).unwrap();

        assert!(manager
            .update_with(|c| c.set_value("storage.max_backups", "0"))
            .is_err());
        assert!(manager
            .update_with(|c| c.set_value("storage.nope", "1"))
            .is_err());
        assert_eq!(manager.get().storage.max_backups, 5);
        assert_eq!(
            ConfigManager::with_path(path).unwrap().get().storage.max_backups,
            5
        );
    }

    #[test]
    fn corrupt_config_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ConfigManager::with_path(path).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
