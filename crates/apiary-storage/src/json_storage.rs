//! JSON 문서 저장소 어댑터.
//!
//! 전체 히스토리를 안정적인 키 아래 JSON 배열 문서 하나로 저장한다.
//! 모든 연산은 문서를 새로 읽어 수정한 뒤 통째로 다시 쓴다 (메모리 캐시 없음).
//! 단일 작성자를 전제로 하며, 여러 인스턴스가 같은 문서를 쓰면 마지막 쓰기가 이긴다.

use apiary_core::error::CoreError;
use apiary_core::models::backup::{BackupInfo, BackupSnapshot, ExportEnvelope};
use apiary_core::models::history::{HistoryEntry, HistoryEntryUpdate};
use apiary_core::models::report::StorageStats;
use apiary_core::models::storage::StorageKind;
use apiary_core::ports::history_storage::HistoryStorage;
use apiary_core::ports::kv_store::KeyValueStore;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backup::BackupRotation;
use crate::document::DocumentStore;

/// 히스토리 문서 키
pub const HISTORY_KEY: &str = "apiary_history";

/// 빈 컬렉션 문서
const EMPTY_DOCUMENT: &str = "[]";

/// JSON 문서 저장소: `HistoryStorage` 포트 구현
pub struct JsonStorage {
    documents: DocumentStore,
    backups: BackupRotation,
    max_entries: usize,
}

impl JsonStorage {
    /// 문서/백업 저장소를 직접 지정해 생성
    pub fn new(documents: DocumentStore, backups: BackupRotation, max_entries: usize) -> Self {
        Self {
            documents,
            backups,
            max_entries: max_entries.max(1),
        }
    }

    /// 파일 모드: `<dir>/apiary_history.json`, 백업은 `<dir>/backups/`
    pub fn file(dir: impl Into<PathBuf>, max_entries: usize, max_backups: usize) -> Self {
        let dir = dir.into();
        let backups = BackupRotation::new(DocumentStore::file(dir.join("backups")), "", max_backups);
        Self::new(DocumentStore::file(dir), backups, max_entries)
    }

    /// 키-값 모드: 백업도 같은 저장소에 `apiary_history_backup_*` 키로 저장
    pub fn key_value(store: Arc<dyn KeyValueStore>, max_entries: usize, max_backups: usize) -> Self {
        let documents = DocumentStore::key_value(store);
        let backups =
            BackupRotation::new(documents.clone(), format!("{HISTORY_KEY}_"), max_backups);
        Self::new(documents, backups, max_entries)
    }

    /// 보관 한도
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// 문서 로드: 없거나 손상되었으면 빈 문서로 자가 복구
    ///
    /// 반환값의 두 번째 요소는 직렬화된 문서 크기다.
    /// 그 밖의 읽기 실패는 그대로 전파한다 (빈 목록 위에 쓰면 기존 히스토리를 덮어쓴다).
    async fn load(&self) -> Result<(Vec<HistoryEntry>, u64), CoreError> {
        let content = match self.documents.read(HISTORY_KEY).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!("히스토리 문서 없음, 빈 문서 생성");
                self.self_heal().await;
                return Ok((Vec::new(), EMPTY_DOCUMENT.len() as u64));
            }
            Err(e) => {
                warn!(
                    "히스토리 문서 읽기 실패 ({}): {e}",
                    self.documents.describe()
                );
                return Err(e);
            }
        };

        match serde_json::from_str::<Vec<HistoryEntry>>(&content) {
            Ok(entries) => Ok((entries, content.len() as u64)),
            Err(e) => {
                let err = CoreError::Parse(e.to_string());
                warn!(
                    "히스토리 문서 손상 ({}), 빈 문서로 복구: {err}",
                    self.documents.describe()
                );
                self.self_heal().await;
                Ok((Vec::new(), EMPTY_DOCUMENT.len() as u64))
            }
        }
    }

    async fn self_heal(&self) {
        if let Err(e) = self.documents.write(HISTORY_KEY, EMPTY_DOCUMENT).await {
            warn!("빈 히스토리 문서 쓰기 실패: {e}");
        }
    }

    async fn entries(&self) -> Result<Vec<HistoryEntry>, CoreError> {
        Ok(self.load().await?.0)
    }

    async fn store(&self, entries: &[HistoryEntry]) -> Result<(), CoreError> {
        let content = serde_json::to_string(entries)?;
        self.documents.write(HISTORY_KEY, &content).await
    }

    fn position(entries: &[HistoryEntry], id: &str) -> Result<usize, CoreError> {
        entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CoreError::entry_not_found(id))
    }
}

#[async_trait]
impl HistoryStorage for JsonStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Json
    }

    async fn initialize(&self) -> Result<(), CoreError> {
        self.documents.ensure_ready().await?;
        let count = self.entries().await?.len();
        info!(
            "JSON 저장소 초기화: {} ({count} 항목, 최대 {})",
            self.documents.describe(),
            self.max_entries
        );
        Ok(())
    }

    async fn get_history(&self) -> Result<Vec<HistoryEntry>, CoreError> {
        self.entries().await
    }

    async fn add_history_entry(&self, mut entry: HistoryEntry) -> Result<HistoryEntry, CoreError> {
        let mut entries = self.entries().await?;
        if entry.needs_id() || entries.iter().any(|e| e.id == entry.id) {
            entry.id = HistoryEntry::generate_id();
        }

        entries.insert(0, entry.clone());
        if entries.len() > self.max_entries {
            let dropped = entries.len() - self.max_entries;
            entries.truncate(self.max_entries);
            debug!("히스토리 한도 초과, 오래된 항목 {dropped}개 삭제");
        }

        self.store(&entries).await?;
        debug!("히스토리 추가: id={}, {} {}", entry.id, entry.method, entry.url);
        Ok(entry)
    }

    async fn update_history_entry(
        &self,
        id: &str,
        updates: &HistoryEntryUpdate,
    ) -> Result<HistoryEntry, CoreError> {
        let mut entries = self.entries().await?;
        let index = Self::position(&entries, id)?;
        updates.apply_to(&mut entries[index]);
        let updated = entries[index].clone();
        self.store(&entries).await?;
        debug!("히스토리 업데이트: id={id}");
        Ok(updated)
    }

    async fn delete_history_entry(&self, id: &str) -> Result<(), CoreError> {
        let mut entries = self.entries().await?;
        let index = Self::position(&entries, id)?;
        entries.remove(index);
        self.store(&entries).await?;
        debug!("히스토리 삭제: id={id}");
        Ok(())
    }

    async fn toggle_history_star(&self, id: &str) -> Result<HistoryEntry, CoreError> {
        let mut entries = self.entries().await?;
        let index = Self::position(&entries, id)?;
        entries[index].starred = !entries[index].starred;
        let toggled = entries[index].clone();
        self.store(&entries).await?;
        debug!("즐겨찾기 토글: id={id}, starred={}", toggled.starred);
        Ok(toggled)
    }

    async fn clear_all_history(&self) -> Result<(), CoreError> {
        self.documents.write(HISTORY_KEY, EMPTY_DOCUMENT).await?;
        info!("JSON 히스토리 전체 삭제");
        Ok(())
    }

    async fn import_history(&self, envelope: &ExportEnvelope) -> Result<usize, CoreError> {
        envelope.validate()?;
        let entries: Vec<HistoryEntry> = envelope
            .history
            .iter()
            .cloned()
            .map(|mut e| {
                if e.needs_id() {
                    e.id = HistoryEntry::generate_id();
                }
                e
            })
            .collect();

        // clear + 일괄 쓰기를 문서 교체 한 번으로
        self.store(&entries).await?;
        info!(
            "JSON 히스토리 가져오기: {} 항목 (원본: {})",
            entries.len(),
            envelope.source
        );
        Ok(entries.len())
    }

    async fn create_backup(&self) -> Result<BackupInfo, CoreError> {
        let snapshot = BackupSnapshot::new(StorageKind::Json, self.entries().await?);
        self.backups.save(&snapshot).await
    }

    async fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        self.backups.list().await
    }

    async fn restore_backup(&self, backup_id: &str) -> Result<usize, CoreError> {
        let snapshot = self.backups.load(backup_id).await?;
        self.store(&snapshot.history).await?;
        info!(
            "JSON 백업 복원: {backup_id} ({} 항목)",
            snapshot.history.len()
        );
        Ok(snapshot.history.len())
    }

    async fn get_stats(&self) -> Result<StorageStats, CoreError> {
        let (entries, bytes) = self.load().await?;
        let mut stats = StorageStats::from_entries(StorageKind::Json, &entries);
        stats.document_bytes = Some(bytes);
        stats.backup_count = self.backups.count().await?;
        Ok(stats)
    }

    async fn test_connection(&self) -> bool {
        self.documents.ensure_ready().await.is_ok()
    }
}
