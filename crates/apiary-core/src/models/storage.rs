//! 저장소 종류와 영속 저장소 설정 모델.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 저장소 백엔드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// 로컬 JSON 문서 저장소 (항상 사용 가능, 최후의 폴백)
    Json,
    /// 원격 관계형 저장소
    Database,
}

impl StorageKind {
    /// 모든 저장소 종류
    pub const ALL: [StorageKind; 2] = [StorageKind::Json, StorageKind::Database];

    /// 직렬화 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Json => "json",
            StorageKind::Database => "database",
        }
    }

    /// 반대편 저장소 종류
    pub fn other(&self) -> StorageKind {
        match self {
            StorageKind::Json => StorageKind::Database,
            StorageKind::Database => StorageKind::Json,
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(StorageKind::Json),
            "database" | "db" => Ok(StorageKind::Database),
            other => Err(CoreError::UnsupportedStorageKind(other.to_string())),
        }
    }
}

/// 백엔드 사용 가능 여부 캐시
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    /// 마지막 확인 결과
    pub available: bool,
    /// 마지막 확인 시각
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    /// 실패 사유 등 부가 메시지
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 백엔드별 사용 가능 여부
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendAvailability {
    pub json: Availability,
    pub database: Availability,
}

impl Default for BackendAvailability {
    fn default() -> Self {
        Self {
            // JSON은 항상 사용 가능
            json: Availability {
                available: true,
                last_checked: None,
                message: None,
            },
            database: Availability::default(),
        }
    }
}

impl BackendAvailability {
    /// 종류별 조회
    pub fn get(&self, kind: StorageKind) -> &Availability {
        match kind {
            StorageKind::Json => &self.json,
            StorageKind::Database => &self.database,
        }
    }

    /// 종류별 갱신
    pub fn set(&mut self, kind: StorageKind, availability: Availability) {
        match kind {
            StorageKind::Json => self.json = availability,
            StorageKind::Database => self.database = availability,
        }
    }
}

/// 데이터베이스 연결 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// 아직 확인 안 됨
    #[default]
    Unknown,
    /// 연결됨
    Connected,
    /// 연결 끊김
    Disconnected,
}

/// JSON 백엔드 세부 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonBackendSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 자동 백업 주기 (시간)
    #[serde(default = "default_backup_interval_hours")]
    pub backup_interval_hours: u32,
}

impl Default for JsonBackendSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backup_interval_hours: default_backup_interval_hours(),
        }
    }
}

/// 데이터베이스 백엔드 세부 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseBackendSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 마지막으로 관측한 연결 상태
    #[serde(default)]
    pub connection_status: ConnectionState,
    /// 자동 백업 주기 (시간)
    #[serde(default = "default_backup_interval_hours")]
    pub backup_interval_hours: u32,
}

impl Default for DatabaseBackendSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            connection_status: ConnectionState::Unknown,
            backup_interval_hours: default_backup_interval_hours(),
        }
    }
}

/// 영속 저장소 설정: 재시작 후에도 유지되는 활성 백엔드와 가용성 캐시
///
/// `storage_type`이 `None`이면 아직 한 번도 백엔드를 고르지 않은 첫 실행 상태다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 활성 백엔드 종류
    #[serde(default)]
    pub storage_type: Option<StorageKind>,
    /// 활성 백엔드를 고른 시각
    #[serde(default)]
    pub selected_at: Option<DateTime<Utc>>,
    /// 자동 폴백 사유 (마지막 폴백 시)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// 백엔드별 가용성
    #[serde(default)]
    pub availability: BackendAvailability,
    /// JSON 백엔드 설정
    #[serde(default)]
    pub json: JsonBackendSettings,
    /// 데이터베이스 백엔드 설정
    #[serde(default)]
    pub database: DatabaseBackendSettings,
}

impl StorageConfig {
    /// 현재 활성 종류 (미선택이면 JSON)
    pub fn active_kind(&self) -> StorageKind {
        self.storage_type.unwrap_or(StorageKind::Json)
    }

    /// 백엔드가 사용자 설정에서 활성화되어 있는지
    pub fn is_enabled(&self, kind: StorageKind) -> bool {
        match kind {
            StorageKind::Json => true,
            StorageKind::Database => self.database.enabled,
        }
    }

    /// 자동 백업 주기 (0시간이면 비활성)
    pub fn backup_interval(&self, kind: StorageKind) -> Option<Duration> {
        let hours = match kind {
            StorageKind::Json => self.json.backup_interval_hours,
            StorageKind::Database => self.database.backup_interval_hours,
        };
        (hours > 0).then(|| Duration::hours(i64::from(hours)))
    }

    /// 가장 최근 백업 시각 기준으로 자동 백업이 필요한지
    pub fn is_backup_due(
        &self,
        kind: StorageKind,
        newest_backup: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        match (self.backup_interval(kind), newest_backup) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(interval), Some(newest)) => now - newest >= interval,
        }
    }
}

/// 마이그레이션 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStep {
    /// 원본 어댑터 초기화
    InitializeSource,
    /// 대상 어댑터 초기화
    InitializeTarget,
    /// 원본 내보내기
    ExportSource,
    /// 대상 기존 데이터 백업 (실패해도 치명적이지 않음)
    BackupTarget,
    /// 대상으로 가져오기
    ImportTarget,
    /// 활성 백엔드 전환
    SwitchActive,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MigrationStep::InitializeSource => "initialize_source",
            MigrationStep::InitializeTarget => "initialize_target",
            MigrationStep::ExportSource => "export_source",
            MigrationStep::BackupTarget => "backup_target",
            MigrationStep::ImportTarget => "import_target",
            MigrationStep::SwitchActive => "switch_active",
        };
        f.write_str(s)
    }
}

fn default_true() -> bool {
    true
}

fn default_backup_interval_hours() -> u32 {
    24
}
