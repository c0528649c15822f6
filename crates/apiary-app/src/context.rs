//! 애플리케이션 컨텍스트: 어댑터 생성 및 의존성 주입.
//!
//! 전역 싱글턴 대신 명시적으로 구성한 컨텍스트를 소비자에게 전달한다.

use apiary_core::config::{AppConfig, DatabaseMode, JsonMode};
use apiary_core::error::CoreError;
use apiary_core::ports::api_client::HistoryApiClient;
use apiary_core::ports::history_storage::HistoryStorage;
use apiary_core::ports::kv_store::KeyValueStore;
use apiary_network::http_client::HttpHistoryClient;
use apiary_storage::backup::BackupRotation;
use apiary_storage::database_storage::DatabaseStorage;
use apiary_storage::document::DocumentStore;
use apiary_storage::json_storage::JsonStorage;
use apiary_storage::kv_store::{FileKeyValueStore, MemoryKeyValueStore};
use apiary_storage::sqlite::SqliteHistoryClient;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config_store::ConfigStore;
use crate::history_store::HistoryStore;
use crate::storage_interface::{StorageAdapters, StorageInterface};

/// JSON 파일 모드 디렉토리
const JSON_DIR: &str = "json";
/// 키-값 모드 문서 파일
const KV_DOCUMENT_FILE: &str = "documents.json";
/// 임베디드 데이터베이스 파일
const EMBEDDED_DB_FILE: &str = "history.db";
/// 데이터베이스 어댑터 백업 디렉토리
const DATABASE_BACKUP_DIR: &str = "database-backups";

/// 구성된 애플리케이션 컨텍스트
pub struct AppContext {
    pub config: AppConfig,
    pub config_store: Arc<ConfigStore>,
    pub storage: Arc<StorageInterface>,
    pub history: Arc<HistoryStore>,
}

impl AppContext {
    /// 설정으로부터 어댑터를 만들고 컨텍스트 구성
    pub async fn build(
        config: AppConfig,
        data_dir: &Path,
        preferences: Arc<dyn KeyValueStore>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let adapters = build_adapters(&config, data_dir).await?;
        Self::from_adapters(config, adapters, preferences).await
    }

    /// 이미 만든 어댑터로 컨텍스트 구성 (테스트용 가짜 어댑터 주입 가능)
    pub async fn from_adapters(
        config: AppConfig,
        adapters: StorageAdapters,
        preferences: Arc<dyn KeyValueStore>,
    ) -> Result<Self, CoreError> {
        let config_store = Arc::new(ConfigStore::load(preferences).await?);
        let storage = Arc::new(StorageInterface::new(adapters, config_store.clone()));
        let history = Arc::new(HistoryStore::new(storage.clone()));

        Ok(Self {
            config,
            config_store,
            storage,
            history,
        })
    }
}

/// 설정에 맞는 JSON/데이터베이스 어댑터 생성
pub async fn build_adapters(
    config: &AppConfig,
    data_dir: &Path,
) -> Result<StorageAdapters, CoreError> {
    let settings = &config.storage;

    let json: Arc<dyn HistoryStorage> = match resolve_json_mode(settings.json_mode, data_dir).await
    {
        JsonMode::File | JsonMode::Auto => {
            let dir = data_dir.join(JSON_DIR);
            info!("JSON 저장소: 파일 모드 ({})", dir.display());
            Arc::new(JsonStorage::file(
                dir,
                settings.max_history_entries,
                settings.max_backups,
            ))
        }
        JsonMode::KeyValue => {
            let store: Arc<dyn KeyValueStore> = match tokio::fs::create_dir_all(data_dir).await {
                Ok(()) => Arc::new(FileKeyValueStore::new(data_dir.join(KV_DOCUMENT_FILE))),
                Err(e) => {
                    warn!("데이터 디렉토리 사용 불가, 인메모리 키-값 저장소 사용: {e}");
                    Arc::new(MemoryKeyValueStore::new())
                }
            };
            info!("JSON 저장소: 키-값 모드");
            Arc::new(JsonStorage::key_value(
                store,
                settings.max_history_entries,
                settings.max_backups,
            ))
        }
    };

    let client: Arc<dyn HistoryApiClient> = match settings.database_mode {
        DatabaseMode::Remote => {
            info!("데이터베이스 저장소: 원격 ({})", config.server.base_url);
            Arc::new(HttpHistoryClient::from_config(&config.server)?)
        }
        DatabaseMode::Embedded => {
            let path = data_dir.join(EMBEDDED_DB_FILE);
            info!("데이터베이스 저장소: 임베디드 ({})", path.display());
            Arc::new(SqliteHistoryClient::open(&path)?)
        }
    };
    let database: Arc<dyn HistoryStorage> = Arc::new(DatabaseStorage::new(
        client,
        BackupRotation::new(
            DocumentStore::file(data_dir.join(DATABASE_BACKUP_DIR)),
            "",
            settings.max_backups,
        ),
        config.server.probe_timeout(),
    ));

    Ok(StorageAdapters { json, database })
}

/// `auto` 모드 해석: 데이터 디렉토리를 만들 수 있으면 파일, 아니면 키-값
async fn resolve_json_mode(mode: JsonMode, data_dir: &Path) -> JsonMode {
    match mode {
        JsonMode::Auto => match tokio::fs::create_dir_all(data_dir.join(JSON_DIR)).await {
            Ok(()) => JsonMode::File,
            Err(e) => {
                warn!("파일 시스템 사용 불가, 키-값 모드로 전환: {e}");
                JsonMode::KeyValue
            }
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_core::models::history::HistoryEntry;
    use apiary_core::models::storage::StorageKind;
    use tempfile::TempDir;

    fn embedded_config() -> AppConfig {
        let mut config = AppConfig::default_config();
        config.storage.database_mode = DatabaseMode::Embedded;
        config
    }

    #[tokio::test]
    async fn embedded_context_prefers_database() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = AppContext::build(
            embedded_config(),
            temp_dir.path(),
            Arc::new(MemoryKeyValueStore::new()),
        )
        .await
        .unwrap();

        assert_eq!(ctx.storage.initialize().await.unwrap(), StorageKind::Database);
        assert!(temp_dir.path().join(EMBEDDED_DB_FILE).exists());
    }

    #[tokio::test]
    async fn key_value_mode_writes_single_document_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = embedded_config();
        config.storage.json_mode = JsonMode::KeyValue;
        let ctx = AppContext::build(
            config,
            temp_dir.path(),
            Arc::new(MemoryKeyValueStore::new()),
        )
        .await
        .unwrap();
        ctx.storage.initialize().await.unwrap();
        ctx.storage
            .switch_to_storage_type(StorageKind::Json)
            .await
            .unwrap();

        ctx.storage
            .add_history_entry(HistoryEntry::new("GET", "https://example.com"))
            .await
            .unwrap();
        assert!(temp_dir.path().join(KV_DOCUMENT_FILE).exists());
        assert!(!temp_dir.path().join(JSON_DIR).exists());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = embedded_config();
        config.storage.max_history_entries = 0;

        let result = AppContext::build(
            config,
            temp_dir.path(),
            Arc::new(MemoryKeyValueStore::new()),
        )
        .await;
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }
}
