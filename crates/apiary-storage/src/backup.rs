//! 백업 스냅샷 순환 보관.
//!
//! 스냅샷 하나를 문서 하나로 저장하고, 최신 N개만 남긴다.
//! 문서 키는 `<key_prefix><snapshot id>`이며 snapshot id는 `backup_`로 시작한다.

use apiary_core::error::CoreError;
use apiary_core::models::backup::{BackupInfo, BackupSnapshot};
use tracing::{debug, info, warn};

use crate::document::DocumentStore;

/// 스냅샷 ID 접두사
const SNAPSHOT_ID_PREFIX: &str = "backup_";

/// 백업 순환 보관소
#[derive(Debug, Clone)]
pub struct BackupRotation {
    documents: DocumentStore,
    key_prefix: String,
    max_backups: usize,
}

impl BackupRotation {
    /// 새 보관소
    ///
    /// `max_backups`가 0이면 1로 보정한다.
    pub fn new(documents: DocumentStore, key_prefix: impl Into<String>, max_backups: usize) -> Self {
        Self {
            documents,
            key_prefix: key_prefix.into(),
            max_backups: max_backups.max(1),
        }
    }

    /// 보관 한도
    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// 스냅샷 저장 후 오래된 백업 정리
    pub async fn save(&self, snapshot: &BackupSnapshot) -> Result<BackupInfo, CoreError> {
        self.documents.ensure_ready().await?;
        let content = serde_json::to_string(snapshot)?;
        self.documents
            .write(&self.key_for(&snapshot.id), &content)
            .await?;
        info!(
            "백업 생성: {} ({} 항목, {})",
            snapshot.id,
            snapshot.history.len(),
            snapshot.source
        );

        self.prune().await?;
        Ok(snapshot.info())
    }

    /// 백업 목록 (최신 순)
    ///
    /// 읽을 수 없는 백업 문서는 경고 후 건너뛴다.
    pub async fn list(&self) -> Result<Vec<BackupInfo>, CoreError> {
        let mut infos = Vec::new();
        for key in self.backup_keys().await? {
            match self.read_snapshot(&key).await {
                Ok(Some(snapshot)) => infos.push(snapshot.info()),
                Ok(None) => {}
                Err(e) => warn!("백업 문서 건너뜀: {key}: {e}"),
            }
        }
        infos.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(infos)
    }

    /// 백업 수
    pub async fn count(&self) -> Result<usize, CoreError> {
        Ok(self.backup_keys().await?.len())
    }

    /// 스냅샷 로드
    pub async fn load(&self, backup_id: &str) -> Result<BackupSnapshot, CoreError> {
        if !backup_id.starts_with(SNAPSHOT_ID_PREFIX) || backup_id.contains(['/', '\\']) {
            return Err(backup_not_found(backup_id));
        }
        self.read_snapshot(&self.key_for(backup_id))
            .await?
            .ok_or_else(|| backup_not_found(backup_id))
    }

    /// 한도를 넘는 오래된 백업 삭제
    async fn prune(&self) -> Result<(), CoreError> {
        let infos = self.list().await?;
        for stale in infos.iter().skip(self.max_backups) {
            self.documents.remove(&self.key_for(&stale.id)).await?;
            debug!("오래된 백업 삭제: {}", stale.id);
        }
        Ok(())
    }

    async fn backup_keys(&self) -> Result<Vec<String>, CoreError> {
        let prefix = format!("{}{}", self.key_prefix, SNAPSHOT_ID_PREFIX);
        self.documents.list(&prefix).await
    }

    async fn read_snapshot(&self, key: &str) -> Result<Option<BackupSnapshot>, CoreError> {
        match self.documents.read(key).await? {
            Some(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| CoreError::Parse(format!("백업 문서 파싱 실패: {key}: {e}"))),
            None => Ok(None),
        }
    }

    fn key_for(&self, backup_id: &str) -> String {
        format!("{}{}", self.key_prefix, backup_id)
    }
}

fn backup_not_found(backup_id: &str) -> CoreError {
    CoreError::NotFound {
        resource_type: "Backup".to_string(),
        id: backup_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_core::models::history::HistoryEntry;
    use apiary_core::models::storage::StorageKind;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn snapshot_at(minutes_ago: i64, entries: usize) -> BackupSnapshot {
        let mut snapshot = BackupSnapshot::new(
            StorageKind::Json,
            (0..entries)
                .map(|i| HistoryEntry::new("GET", format!("https://example.com/{i}")))
                .collect(),
        );
        snapshot.timestamp = Utc::now() - Duration::minutes(minutes_ago);
        snapshot
    }

    #[tokio::test]
    async fn keeps_only_newest_backups() {
        let temp_dir = TempDir::new().unwrap();
        let rotation = BackupRotation::new(DocumentStore::file(temp_dir.path()), "", 2);

        let oldest = snapshot_at(30, 1);
        let middle = snapshot_at(20, 2);
        let newest = snapshot_at(10, 3);
        rotation.save(&oldest).await.unwrap();
        rotation.save(&middle).await.unwrap();
        rotation.save(&newest).await.unwrap();

        let infos = rotation.list().await.unwrap();
        let ids: Vec<_> = infos.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![newest.id.as_str(), middle.id.as_str()]);
        assert_eq!(rotation.count().await.unwrap(), 2);
        assert!(rotation.load(&oldest.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn load_returns_full_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let rotation = BackupRotation::new(DocumentStore::file(temp_dir.path()), "history_", 5);
        let snapshot = snapshot_at(0, 4);
        let info = rotation.save(&snapshot).await.unwrap();

        assert_eq!(info.entry_count, 4);
        let loaded = rotation.load(&info.id).await.unwrap();
        assert_eq!(loaded, snapshot);
        assert!(temp_dir
            .path()
            .join(format!("history_{}.json", snapshot.id))
            .exists());
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let rotation = BackupRotation::new(DocumentStore::file(temp_dir.path()), "", 5);
        assert!(rotation.load("backup_missing").await.unwrap_err().is_not_found());
        assert!(rotation.load("../etc/passwd").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn corrupt_backup_is_skipped_in_listing() {
        let temp_dir = TempDir::new().unwrap();
        let rotation = BackupRotation::new(DocumentStore::file(temp_dir.path()), "", 5);
        rotation.save(&snapshot_at(0, 1)).await.unwrap();
        std::fs::write(temp_dir.path().join("backup_broken.json"), "{").unwrap();

        assert_eq!(rotation.list().await.unwrap().len(), 1);
    }
}
