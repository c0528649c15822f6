//! 통합 테스트 공용 구성.
//!
//! JSON 파일 어댑터 + 임베디드 SQLite 데이터베이스 어댑터로 전체 스택을 만들고,
//! 실패 경로 검증용 `FlakyStorage` 래퍼를 제공한다.

#![allow(dead_code)]

use apiary_app::config_store::ConfigStore;
use apiary_app::history_store::HistoryStore;
use apiary_app::storage_interface::{StorageAdapters, StorageInterface};
use apiary_core::error::CoreError;
use apiary_core::models::backup::{BackupInfo, ExportEnvelope};
use apiary_core::models::history::{HistoryEntry, HistoryEntryUpdate};
use apiary_core::models::report::StorageStats;
use apiary_core::models::storage::StorageKind;
use apiary_core::ports::history_storage::HistoryStorage;
use apiary_core::ports::kv_store::KeyValueStore;
use apiary_storage::backup::BackupRotation;
use apiary_storage::database_storage::DatabaseStorage;
use apiary_storage::document::DocumentStore;
use apiary_storage::json_storage::JsonStorage;
use apiary_storage::kv_store::MemoryKeyValueStore;
use apiary_storage::sqlite::SqliteHistoryClient;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const MAX_ENTRIES: usize = 100;

pub fn json_dir(root: &Path) -> PathBuf {
    root.join("json")
}

pub fn json_adapter(root: &Path, max_entries: usize) -> Arc<JsonStorage> {
    Arc::new(JsonStorage::file(json_dir(root), max_entries, 5))
}

pub fn database_adapter(root: &Path) -> Arc<DatabaseStorage> {
    Arc::new(DatabaseStorage::new(
        Arc::new(SqliteHistoryClient::open(&root.join("history.db")).unwrap()),
        BackupRotation::new(DocumentStore::file(root.join("database-backups")), "", 5),
        Duration::from_secs(3),
    ))
}

pub fn request(i: usize) -> HistoryEntry {
    HistoryEntry::new("GET", format!("https://api.example.com/items/{i}"))
        .with_header("Accept", "application/json")
        .with_response(200, format!(r#"{{"id":{i}}}"#), 10 + i as u64)
}

/// 파사드 구성 (환경설정은 인메모리)
pub async fn facade(
    json: Arc<dyn HistoryStorage>,
    database: Arc<dyn HistoryStorage>,
) -> (Arc<StorageInterface>, Arc<dyn KeyValueStore>) {
    let preferences: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    let config = ConfigStore::load(preferences.clone()).await.unwrap();
    let storage = StorageInterface::new(StorageAdapters { json, database }, Arc::new(config));
    (Arc::new(storage), preferences)
}

/// JSON 파일 + 임베디드 SQLite 전체 스택
pub async fn full_stack(root: &Path) -> Arc<StorageInterface> {
    facade(json_adapter(root, MAX_ENTRIES), database_adapter(root))
        .await
        .0
}

pub async fn history_store(storage: Arc<StorageInterface>) -> HistoryStore {
    HistoryStore::new(storage)
}

/// 지정한 연산만 실패시키는 어댑터 래퍼
pub struct FlakyStorage {
    inner: Arc<dyn HistoryStorage>,
    pub fail_initialize: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_backup: AtomicBool,
    pub fail_import: AtomicBool,
    /// 추가 연산 지연
    pub add_delay: Option<Duration>,
    pub initialize_calls: AtomicUsize,
}

impl FlakyStorage {
    pub fn new(inner: Arc<dyn HistoryStorage>) -> Self {
        Self {
            inner,
            fail_initialize: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_backup: AtomicBool::new(false),
            fail_import: AtomicBool::new(false),
            add_delay: None,
            initialize_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_add_delay(mut self, delay: Duration) -> Self {
        self.add_delay = Some(delay);
        self
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), CoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(CoreError::Connection(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HistoryStorage for FlakyStorage {
    fn kind(&self) -> StorageKind {
        self.inner.kind()
    }

    async fn initialize(&self) -> Result<(), CoreError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        Self::check(&self.fail_initialize, "initialize")?;
        self.inner.initialize().await
    }

    async fn get_history(&self) -> Result<Vec<HistoryEntry>, CoreError> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get_history().await
    }

    async fn add_history_entry(&self, entry: HistoryEntry) -> Result<HistoryEntry, CoreError> {
        if let Some(delay) = self.add_delay {
            tokio::time::sleep(delay).await;
        }
        Self::check(&self.fail_writes, "write")?;
        self.inner.add_history_entry(entry).await
    }

    async fn update_history_entry(
        &self,
        id: &str,
        updates: &HistoryEntryUpdate,
    ) -> Result<HistoryEntry, CoreError> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.update_history_entry(id, updates).await
    }

    async fn delete_history_entry(&self, id: &str) -> Result<(), CoreError> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.delete_history_entry(id).await
    }

    async fn toggle_history_star(&self, id: &str) -> Result<HistoryEntry, CoreError> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.toggle_history_star(id).await
    }

    async fn clear_all_history(&self) -> Result<(), CoreError> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.clear_all_history().await
    }

    async fn export_history(&self) -> Result<ExportEnvelope, CoreError> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.export_history().await
    }

    async fn import_history(&self, envelope: &ExportEnvelope) -> Result<usize, CoreError> {
        Self::check(&self.fail_import, "import")?;
        self.inner.import_history(envelope).await
    }

    async fn create_backup(&self) -> Result<BackupInfo, CoreError> {
        Self::check(&self.fail_backup, "backup")?;
        self.inner.create_backup().await
    }

    async fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        self.inner.list_backups().await
    }

    async fn restore_backup(&self, backup_id: &str) -> Result<usize, CoreError> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.restore_backup(backup_id).await
    }

    async fn get_stats(&self) -> Result<StorageStats, CoreError> {
        self.inner.get_stats().await
    }

    async fn test_connection(&self) -> bool {
        !self.fail_initialize.load(Ordering::SeqCst) && self.inner.test_connection().await
    }
}
