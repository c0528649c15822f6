//! 히스토리 저장소 포트.
//!
//! 구현: `apiary-storage` crate (`JsonStorage`, `DatabaseStorage`)
//!
//! 두 백엔드는 이 계약 하나를 공유하며, 파사드는 저장소 종류 문자열 분기 대신
//! `StorageKind` → `Arc<dyn HistoryStorage>` 매핑으로 라우팅한다.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::backup::{BackupInfo, ExportEnvelope};
use crate::models::history::{HistoryEntry, HistoryEntryUpdate};
use crate::models::report::StorageStats;
use crate::models::storage::StorageKind;

/// 요청 히스토리 저장소 (어댑터 공통 계약)
#[async_trait]
pub trait HistoryStorage: Send + Sync {
    /// 이 어댑터의 백엔드 종류
    fn kind(&self) -> StorageKind;

    /// 어댑터 초기화 (디렉토리 준비, 연결 확인 등)
    async fn initialize(&self) -> Result<(), CoreError>;

    /// 전체 항목 조회 (최신 순)
    async fn get_history(&self) -> Result<Vec<HistoryEntry>, CoreError>;

    /// 항목 추가: ID가 없으면 할당하고 저장된 항목을 반환
    async fn add_history_entry(&self, entry: HistoryEntry) -> Result<HistoryEntry, CoreError>;

    /// 항목 부분 업데이트
    ///
    /// 존재하지 않는 ID는 `CoreError::NotFound`.
    async fn update_history_entry(
        &self,
        id: &str,
        updates: &HistoryEntryUpdate,
    ) -> Result<HistoryEntry, CoreError>;

    /// 항목 삭제
    ///
    /// 존재하지 않는 ID는 `CoreError::NotFound`이며 컬렉션은 변하지 않는다.
    async fn delete_history_entry(&self, id: &str) -> Result<(), CoreError>;

    /// 즐겨찾기 토글 후 변경된 항목 반환
    async fn toggle_history_star(&self, id: &str) -> Result<HistoryEntry, CoreError>;

    /// 전체 삭제
    async fn clear_all_history(&self) -> Result<(), CoreError>;

    /// 전체 항목을 내보내기 봉투로 감싸 반환
    async fn export_history(&self) -> Result<ExportEnvelope, CoreError> {
        let history = self.get_history().await?;
        Ok(ExportEnvelope::new(self.kind(), history))
    }

    /// 봉투 내용으로 컬렉션 교체 (clear 후 일괄 쓰기)
    ///
    /// 가져온 항목 수를 반환한다.
    async fn import_history(&self, envelope: &ExportEnvelope) -> Result<usize, CoreError>;

    /// 현재 컬렉션의 타임스탬프 백업 생성 (오래된 백업은 정리)
    async fn create_backup(&self) -> Result<BackupInfo, CoreError>;

    /// 보관 중인 백업 목록 (최신 순)
    async fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError>;

    /// 백업으로 컬렉션 복원: 복원된 항목 수 반환
    async fn restore_backup(&self, backup_id: &str) -> Result<usize, CoreError>;

    /// 저장소 통계
    async fn get_stats(&self) -> Result<StorageStats, CoreError>;

    /// 라이브니스 확인: 실패해도 에러 대신 `false`
    async fn test_connection(&self) -> bool;
}
