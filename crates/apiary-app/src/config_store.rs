//! 저장소 설정 저장소 (ConfigStore).
//!
//! 활성 백엔드 종류와 백엔드별 가용성 캐시를 재시작 후에도 유지되는
//! 환경설정 저장소에 보관한다. 가용성 표시를 위해 자체 프로브는 하지만
//! 어댑터 초기화나 마이그레이션은 절대 직접 수행하지 않는다.

use apiary_core::error::CoreError;
use apiary_core::models::storage::{
    Availability, BackendAvailability, ConnectionState, StorageConfig, StorageKind,
};
use apiary_core::ports::history_storage::HistoryStorage;
use apiary_core::ports::kv_store::KeyValueStore;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 환경설정 저장소 내 키
pub const STORAGE_CONFIG_KEY: &str = "storage_config";

/// 저장소 설정 저장소
pub struct ConfigStore {
    preferences: Arc<dyn KeyValueStore>,
    config: RwLock<StorageConfig>,
}

impl ConfigStore {
    /// 환경설정 저장소에서 로드 (없거나 손상되었으면 첫 실행 상태)
    pub async fn load(preferences: Arc<dyn KeyValueStore>) -> Result<Self, CoreError> {
        let config = match preferences.get(STORAGE_CONFIG_KEY).await? {
            Some(raw) => match serde_json::from_str::<StorageConfig>(&raw) {
                Ok(config) => config,
                Err(e) => {
                    warn!("저장소 설정 손상, 기본값 사용: {e}");
                    StorageConfig::default()
                }
            },
            None => {
                debug!("저장소 설정 없음 (첫 실행)");
                StorageConfig::default()
            }
        };

        Ok(Self {
            preferences,
            config: RwLock::new(config),
        })
    }

    /// 현재 설정 (복제본)
    pub fn snapshot(&self) -> StorageConfig {
        self.config.read().clone()
    }

    /// 현재 활성 백엔드 종류 (미선택이면 JSON)
    pub fn get_current_storage_kind(&self) -> StorageKind {
        self.config.read().active_kind()
    }

    /// 한 번이라도 백엔드를 골랐는지 여부
    pub fn has_selection(&self) -> bool {
        self.config.read().storage_type.is_some()
    }

    /// 백엔드 가용성 확인 및 캐시 갱신
    ///
    /// JSON은 항상 사용 가능하며, 데이터베이스는 어댑터의 라이브니스 프로브 결과를 따른다.
    pub async fn check_availability(&self, database: &dyn HistoryStorage) -> BackendAvailability {
        let now = Utc::now();
        let db_available = database.test_connection().await;

        let mut next = self.snapshot();
        next.availability.set(
            StorageKind::Json,
            Availability {
                available: true,
                last_checked: Some(now),
                message: None,
            },
        );
        next.availability.set(
            StorageKind::Database,
            Availability {
                available: db_available,
                last_checked: Some(now),
                message: (!db_available).then(|| "라이브니스 프로브 실패".to_string()),
            },
        );
        next.database.connection_status = if db_available {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };

        let availability = next.availability.clone();
        // 표시용 캐시, 저장 실패는 경고만
        if let Err(e) = self.commit(next).await {
            warn!("가용성 캐시 저장 실패: {e}");
        }
        debug!("가용성 확인: json=true, database={db_available}");
        availability
    }

    /// 첫 실행이면 기본 백엔드 결정
    ///
    /// 데이터베이스 프로브가 성공하면 database, 아니면 json을 선택해 저장한다.
    /// 이미 선택된 백엔드가 있으면 그대로 반환한다.
    pub async fn initialize_storage(
        &self,
        database: &dyn HistoryStorage,
    ) -> Result<StorageKind, CoreError> {
        if let Some(kind) = self.config.read().storage_type {
            return Ok(kind);
        }

        let availability = self.check_availability(database).await;
        let database_enabled = self.snapshot().is_enabled(StorageKind::Database);
        let kind = if availability.database.available && database_enabled {
            StorageKind::Database
        } else {
            StorageKind::Json
        };

        self.set_storage_kind(kind).await?;
        info!("첫 실행 기본 저장소 선택: {kind}");
        Ok(kind)
    }

    /// 활성 백엔드 변경 및 저장
    pub async fn set_storage_kind(&self, kind: StorageKind) -> Result<(), CoreError> {
        let mut next = self.snapshot();
        next.storage_type = Some(kind);
        next.selected_at = Some(Utc::now());
        next.fallback_reason = None;
        self.commit(next).await
    }

    /// 자동 폴백 기록
    pub async fn record_fallback(
        &self,
        kind: StorageKind,
        reason: impl Into<String>,
    ) -> Result<(), CoreError> {
        let reason = reason.into();
        let mut next = self.snapshot();
        next.storage_type = Some(kind);
        next.selected_at = Some(Utc::now());
        next.fallback_reason = Some(reason.clone());
        next.availability.set(
            kind.other(),
            Availability {
                available: false,
                last_checked: Some(Utc::now()),
                message: Some(reason),
            },
        );
        self.commit(next).await
    }

    /// 백엔드 사용 여부 설정
    pub async fn set_backend_enabled(
        &self,
        kind: StorageKind,
        enabled: bool,
    ) -> Result<(), CoreError> {
        let mut next = self.snapshot();
        match kind {
            StorageKind::Json => next.json.enabled = enabled,
            StorageKind::Database => next.database.enabled = enabled,
        }
        self.commit(next).await
    }

    /// 백엔드별 자동 백업 주기 설정 (0이면 비활성)
    pub async fn set_backup_interval(
        &self,
        kind: StorageKind,
        hours: u32,
    ) -> Result<(), CoreError> {
        let mut next = self.snapshot();
        match kind {
            StorageKind::Json => next.json.backup_interval_hours = hours,
            StorageKind::Database => next.database.backup_interval_hours = hours,
        }
        self.commit(next).await
    }

    /// 영속 저장 후 메모리 반영 (저장 실패 시 메모리 상태 유지)
    async fn commit(&self, next: StorageConfig) -> Result<(), CoreError> {
        let raw = serde_json::to_string(&next)?;
        self.preferences.set(STORAGE_CONFIG_KEY, &raw).await?;
        *self.config.write() = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_storage::backup::BackupRotation;
    use apiary_storage::database_storage::DatabaseStorage;
    use apiary_storage::document::DocumentStore;
    use apiary_storage::kv_store::MemoryKeyValueStore;
    use apiary_storage::sqlite::SqliteHistoryClient;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn store() -> (ConfigStore, Arc<dyn KeyValueStore>) {
        let prefs: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        (ConfigStore::load(prefs.clone()).await.unwrap(), prefs)
    }

    #[tokio::test]
    async fn fresh_store_has_no_selection() {
        let (store, _) = store().await;
        assert!(!store.has_selection());
        assert_eq!(store.get_current_storage_kind(), StorageKind::Json);
    }

    #[tokio::test]
    async fn selection_survives_reload() {
        let (store, prefs) = store().await;
        store.set_storage_kind(StorageKind::Database).await.unwrap();

        let reloaded = ConfigStore::load(prefs).await.unwrap();
        assert_eq!(reloaded.get_current_storage_kind(), StorageKind::Database);
        assert!(reloaded.snapshot().selected_at.is_some());
    }

    #[tokio::test]
    async fn fallback_is_recorded_and_cleared_on_explicit_choice() {
        let (store, _) = store().await;
        store
            .record_fallback(StorageKind::Json, "connection refused")
            .await
            .unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.fallback_reason.as_deref(), Some("connection refused"));
        assert!(!snapshot.availability.database.available);

        store.set_storage_kind(StorageKind::Json).await.unwrap();
        assert!(store.snapshot().fallback_reason.is_none());
    }

    #[tokio::test]
    async fn corrupt_preference_falls_back_to_defaults() {
        let prefs: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        prefs.set(STORAGE_CONFIG_KEY, "{oops").await.unwrap();
        let store = ConfigStore::load(prefs).await.unwrap();
        assert!(!store.has_selection());
    }

    #[tokio::test]
    async fn reachable_database_is_chosen_on_first_run() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _) = store().await;
        let database = DatabaseStorage::new(
            Arc::new(SqliteHistoryClient::open_in_memory().unwrap()),
            BackupRotation::new(DocumentStore::file(temp_dir.path()), "", 5),
            Duration::from_secs(3),
        );

        let availability = store.check_availability(&database).await;
        assert!(availability.json.available);
        assert!(availability.database.available);
        assert_eq!(
            store.snapshot().database.connection_status,
            ConnectionState::Connected
        );

        let kind = store.initialize_storage(&database).await.unwrap();
        assert_eq!(kind, StorageKind::Database);
        assert!(store.has_selection());
    }

    #[tokio::test]
    async fn disabled_database_is_not_chosen() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _) = store().await;
        store
            .set_backend_enabled(StorageKind::Database, false)
            .await
            .unwrap();
        let database = DatabaseStorage::new(
            Arc::new(SqliteHistoryClient::open_in_memory().unwrap()),
            BackupRotation::new(DocumentStore::file(temp_dir.path()), "", 5),
            Duration::from_secs(3),
        );

        assert_eq!(
            store.initialize_storage(&database).await.unwrap(),
            StorageKind::Json
        );
    }
}
