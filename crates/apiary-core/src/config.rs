//! 애플리케이션 설정 구조체.
//!
//! 히스토리 서버 엔드포인트, 타임아웃, 로컬 저장소 경로와 보관 한도 등
//! 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// 라이브니스 프로브 최소 타임아웃 (밀리초)
pub const MIN_PROBE_TIMEOUT_MS: u64 = 3_000;
/// 라이브니스 프로브 최대 타임아웃 (밀리초)
pub const MAX_PROBE_TIMEOUT_MS: u64 = 5_000;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 히스토리 서버 연결 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 로컬 저장소 설정
    #[serde(default)]
    pub storage: StorageSettings,
}

// ============================================================
// 서버 설정
// ============================================================

/// 히스토리 서버 연결 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST API 기본 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 일반 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 라이브니스 프로브 타임아웃 (밀리초, 3~5초로 제한)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// 데스크톱 셸이 기록하는 포트 파일 (있으면 `base_url` 대신 사용)
    #[serde(default)]
    pub port_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            port_file: None,
        }
    }
}

impl ServerConfig {
    /// 일반 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 프로브 타임아웃 (3~5초 범위로 보정)
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(
            self.probe_timeout_ms
                .clamp(MIN_PROBE_TIMEOUT_MS, MAX_PROBE_TIMEOUT_MS),
        )
    }
}

// ============================================================
// 저장소 설정
// ============================================================

/// JSON 백엔드의 문서 저장 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonMode {
    /// 실행 환경에 맞게 자동 선택 (네이티브 실행은 파일)
    #[default]
    Auto,
    /// 플랫폼 키-값 저장소
    KeyValue,
    /// 데이터 디렉토리의 JSON 파일
    File,
}

/// 데이터베이스 백엔드 연결 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseMode {
    /// 원격 REST API (reqwest)
    #[default]
    Remote,
    /// 임베디드 SQLite
    Embedded,
}

/// 로컬 저장소 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// 데이터 디렉토리 (없으면 플랫폼 기본 경로)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// 보관할 최대 히스토리 항목 수
    #[serde(default = "default_max_history_entries")]
    pub max_history_entries: usize,
    /// 백엔드별 보관할 최대 백업 수
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    /// JSON 문서 저장 방식
    #[serde(default)]
    pub json_mode: JsonMode,
    /// 데이터베이스 연결 방식
    #[serde(default)]
    pub database_mode: DatabaseMode,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_history_entries: default_max_history_entries(),
            max_backups: default_max_backups(),
            json_mode: JsonMode::Auto,
            database_mode: DatabaseMode::Remote,
        }
    }
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageSettings::default(),
        }
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.server.base_url.trim().is_empty() {
            return Err(CoreError::Validation {
                field: "server.base_url".to_string(),
                message: "비어 있을 수 없습니다".to_string(),
            });
        }
        if self.server.request_timeout_ms == 0 {
            return Err(CoreError::Validation {
                field: "server.request_timeout_ms".to_string(),
                message: "0보다 커야 합니다".to_string(),
            });
        }
        if self.storage.max_history_entries == 0 {
            return Err(CoreError::Validation {
                field: "storage.max_history_entries".to_string(),
                message: "0보다 커야 합니다".to_string(),
            });
        }
        if self.storage.max_backups == 0 {
            return Err(CoreError::Validation {
                field: "storage.max_backups".to_string(),
                message: "0보다 커야 합니다".to_string(),
            });
        }
        Ok(())
    }
}

impl AppConfig {
    /// 점 표기 키로 값 하나 설정 (`apiary config set`)
    ///
    /// 값만 파싱하며 범위 검증은 `validate`가 한다.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let value = value.trim();
        match key {
            "server.base_url" => self.server.base_url = value.to_string(),
            "server.request_timeout_ms" => self.server.request_timeout_ms = parse_number(key, value)?,
            "server.probe_timeout_ms" => self.server.probe_timeout_ms = parse_number(key, value)?,
            "server.port_file" => {
                self.server.port_file = (!value.is_empty()).then(|| PathBuf::from(value))
            }
            "storage.data_dir" => {
                self.storage.data_dir = (!value.is_empty()).then(|| PathBuf::from(value))
            }
            "storage.max_history_entries" => {
                self.storage.max_history_entries = parse_number(key, value)?
            }
            "storage.max_backups" => self.storage.max_backups = parse_number(key, value)?,
            "storage.json_mode" => {
                self.storage.json_mode = match value {
                    "auto" => JsonMode::Auto,
                    "key_value" => JsonMode::KeyValue,
                    "file" => JsonMode::File,
                    _ => return Err(invalid(key, "auto | key_value | file")),
                }
            }
            "storage.database_mode" => {
                self.storage.database_mode = match value {
                    "remote" => DatabaseMode::Remote,
                    "embedded" => DatabaseMode::Embedded,
                    _ => return Err(invalid(key, "remote | embedded")),
                }
            }
            _ => return Err(invalid(key, "알 수 없는 설정 키")),
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CoreError> {
    value.parse().map_err(|_| invalid(key, "숫자가 아닙니다"))
}

fn invalid(key: &str, message: &str) -> CoreError {
    CoreError::Validation {
        field: key.to_string(),
        message: message.to_string(),
    }
}

fn default_base_url() -> String {
    "http://localhost:3001/api".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    MIN_PROBE_TIMEOUT_MS
}

fn default_max_history_entries() -> usize {
    100
}

fn default_max_backups() -> usize {
    5
}
