//! Apiary 핵심 에러 타입.
//!
//! 모든 어댑터 crate와 앱 레이어는 이 `CoreError` 하나로 실패를 표현한다.
//! 어댑터 경계의 I/O 실패는 구조화된 변형으로 변환되어 반환되고,
//! 프로그래머 오류(초기화 전 사용, 알 수 없는 저장소 종류)는 즉시 실패한다.

use thiserror::Error;

use crate::models::storage::{MigrationStep, StorageKind};

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 초기화 전에 저장소 작업 호출
    #[error("저장소가 초기화되지 않았습니다")]
    NotInitialized,

    /// 지원하지 않는 저장소 종류
    #[error("지원하지 않는 저장소 종류: {0}")]
    UnsupportedStorageKind(String),

    /// 연결 실패 (프로브, 라운드 트립)
    #[error("연결 에러: {0}")]
    Connection(String),

    /// 로컬 문서 파싱 실패 (어댑터 내부에서 자가 복구됨)
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 마이그레이션 단계 실패
    #[error("마이그레이션 실패 ({step}, {from} → {to}): {source}")]
    Migration {
        /// 실패한 단계
        step: MigrationStep,
        /// 원본 저장소
        from: StorageKind,
        /// 대상 저장소
        to: StorageKind,
        /// 원인 에러
        #[source]
        source: Box<CoreError>,
    },

    /// 같은 저장소 간 마이그레이션 요청
    #[error("같은 저장소로는 마이그레이션할 수 없습니다: {kind}")]
    InvalidMigration {
        /// 요청된 저장소 종류
        kind: StorageKind,
    },

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "HistoryEntry", "Backup")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 히스토리 항목 미발견 에러 생성
    pub fn entry_not_found(id: impl Into<String>) -> Self {
        CoreError::NotFound {
            resource_type: "HistoryEntry".to_string(),
            id: id.into(),
        }
    }

    /// NotFound 계열인지 여부
    pub fn is_not_found(&self) -> bool {
        match self {
            CoreError::NotFound { .. } => true,
            CoreError::Migration { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// 연결 실패 계열인지 여부
    pub fn is_connection(&self) -> bool {
        match self {
            CoreError::Connection(_) => true,
            CoreError::Migration { source, .. } => source.is_connection(),
            _ => false,
        }
    }

    /// 마이그레이션 실패 시 실패 단계 반환
    pub fn migration_step(&self) -> Option<MigrationStep> {
        match self {
            CoreError::Migration { step, .. } => Some(*step),
            _ => None,
        }
    }
}
