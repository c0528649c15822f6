//! 백업 스냅샷과 내보내기 봉투(Export Envelope) 모델.
//!
//! 내보내기/가져오기, 백업, 백엔드 간 마이그레이션이 모두 같은 봉투 형식을 사용한다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::history::HistoryEntry;
use crate::models::storage::StorageKind;

/// 현재 내보내기 형식 버전
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// 이식 가능한 내보내기 봉투
///
/// `{ version, exported_at, source, history }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEnvelope {
    /// 형식 버전 ("1.0")
    pub version: String,
    /// 내보낸 시각
    pub exported_at: DateTime<Utc>,
    /// 원본 백엔드
    pub source: StorageKind,
    /// 전체 항목 (최신 순)
    pub history: Vec<HistoryEntry>,
}

impl ExportEnvelope {
    /// 현재 시각으로 봉투 생성
    pub fn new(source: StorageKind, history: Vec<HistoryEntry>) -> Self {
        Self {
            version: EXPORT_FORMAT_VERSION.to_string(),
            exported_at: Utc::now(),
            source,
            history,
        }
    }

    /// 형식 검증: 메이저 버전 1만 허용, 중복 ID 거부
    pub fn validate(&self) -> Result<(), CoreError> {
        let major = self.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(CoreError::Validation {
                field: "version".to_string(),
                message: format!("지원하지 않는 형식 버전: {}", self.version),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &self.history {
            if !entry.needs_id() && !seen.insert(entry.id.as_str()) {
                return Err(CoreError::Validation {
                    field: "history".to_string(),
                    message: format!("중복된 항목 ID: {}", entry.id),
                });
            }
        }

        Ok(())
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// 백업 스냅샷: 특정 시점의 전체 항목 목록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    /// 백업 ID (`backup_<타임스탬프>`)
    pub id: String,
    /// 백업 시각
    pub timestamp: DateTime<Utc>,
    /// 원본 백엔드
    pub source: StorageKind,
    /// 전체 항목
    pub history: Vec<HistoryEntry>,
}

impl BackupSnapshot {
    /// 새 스냅샷 생성
    pub fn new(source: StorageKind, history: Vec<HistoryEntry>) -> Self {
        let timestamp = Utc::now();
        // 같은 밀리초 내 충돌 방지용 접미사
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!(
                "backup_{}_{}",
                timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
                &suffix[..6]
            ),
            timestamp,
            source,
            history,
        }
    }

    /// 메타데이터 요약
    pub fn info(&self) -> BackupInfo {
        BackupInfo {
            id: self.id.clone(),
            timestamp: self.timestamp,
            source: self.source,
            entry_count: self.history.len(),
        }
    }
}

/// 백업 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: StorageKind,
    pub entry_count: usize,
}
