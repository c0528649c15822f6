//! 통계, 상태 점검, 연결 상태, 마이그레이션 결과 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::backup::BackupInfo;
use crate::models::history::HistoryEntry;
use crate::models::storage::StorageKind;

/// 저장소 통계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    /// 백엔드 종류
    pub kind: StorageKind,
    /// 전체 항목 수
    pub total_entries: usize,
    /// 즐겨찾기 항목 수
    pub starred_entries: usize,
    /// 가장 오래된 요청 시각
    pub oldest_timestamp: Option<DateTime<Utc>>,
    /// 가장 최근 요청 시각
    pub newest_timestamp: Option<DateTime<Utc>>,
    /// 직렬화된 문서 크기 (JSON 백엔드만)
    pub document_bytes: Option<u64>,
    /// 보관 중인 백업 수
    pub backup_count: usize,
}

impl StorageStats {
    /// 항목 목록으로부터 통계 계산
    pub fn from_entries(kind: StorageKind, entries: &[HistoryEntry]) -> Self {
        Self {
            kind,
            total_entries: entries.len(),
            starred_entries: entries.iter().filter(|e| e.starred).count(),
            oldest_timestamp: entries.iter().map(|e| e.timestamp).min(),
            newest_timestamp: entries.iter().map(|e| e.timestamp).max(),
            document_bytes: None,
            backup_count: 0,
        }
    }
}

/// 데이터베이스 연결 상태 (라이브니스 프로브 결과)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// 연결 성공 여부
    pub connected: bool,
    /// 프로브한 엔드포인트
    pub endpoint: String,
    /// 왕복 지연 (밀리초)
    pub latency_ms: Option<u64>,
    /// 확인 시각
    pub checked_at: DateTime<Utc>,
    /// 실패 사유
    pub error: Option<String>,
}

/// 백엔드별 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub kind: StorageKind,
    pub available: bool,
    pub active: bool,
    pub message: Option<String>,
}

/// 전체 상태 점검 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// 현재 활성 백엔드
    pub active_kind: StorageKind,
    /// 파사드 초기화 여부
    pub initialized: bool,
    /// 활성 백엔드가 사용 가능한지
    pub healthy: bool,
    /// 백엔드별 상태
    pub backends: Vec<BackendHealth>,
    /// 점검 시각
    pub checked_at: DateTime<Utc>,
}

/// 마이그레이션 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub from: StorageKind,
    pub to: StorageKind,
    /// 이전된 항목 수
    pub migrated_entries: usize,
    /// 대상의 기존 데이터 백업 (성공 시)
    pub backup: Option<BackupInfo>,
    /// 치명적이지 않은 경고 (백업 실패 등)
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
