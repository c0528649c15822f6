//! 임베디드 SQLite 히스토리 저장소.
//!
//! 원격 REST API와 같은 `HistoryApiClient` 봉투 계약을 로컬 SQLite 파일에 대해 구현한다.
//! `database_mode = embedded`일 때 데이터베이스 어댑터의 백엔드로 쓰인다.
//!
//! # 모듈 구조
//! - `history`: history 테이블 쿼리

mod history;

use apiary_core::error::CoreError;
use apiary_core::models::history::{HistoryEntry, HistoryEntryUpdate};
use apiary_core::ports::api_client::{ApiEnvelope, HistoryApiClient};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::migration;

/// SQLite 히스토리 저장소: `HistoryApiClient` 포트 구현
pub struct SqliteHistoryClient {
    pub(super) conn: Mutex<Connection>,
    location: String,
}

impl SqliteHistoryClient {
    /// 파일 기반 저장소 생성
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoreError::Internal(format!("DB 디렉토리 생성 실패: {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| CoreError::Internal(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )
        .map_err(|e| CoreError::Internal(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Internal(format!("마이그레이션 실패: {e}")))?;

        info!("SQLite 히스토리 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            location: format!("sqlite://{}", path.display()),
        })
    }

    /// 인메모리 저장소 생성 (테스트용)
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Internal(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Internal(format!("마이그레이션 실패: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            location: "sqlite::memory:".to_string(),
        })
    }
}

#[async_trait]
impl HistoryApiClient for SqliteHistoryClient {
    async fn resolve_base_url(&self) -> Result<String, CoreError> {
        Ok(self.location.clone())
    }

    async fn health(&self) -> ApiEnvelope<()> {
        ApiEnvelope::from_result(self.ping())
    }

    async fn get_history(&self) -> ApiEnvelope<Vec<HistoryEntry>> {
        ApiEnvelope::from_result(self.list_entries())
    }

    async fn add_to_history(&self, entry: &HistoryEntry) -> ApiEnvelope<HistoryEntry> {
        ApiEnvelope::from_result(self.insert_entry(entry))
    }

    async fn update_history(
        &self,
        id: &str,
        updates: &HistoryEntryUpdate,
    ) -> ApiEnvelope<HistoryEntry> {
        ApiEnvelope::from_result(self.update_entry(id, updates))
    }

    async fn delete_history(&self, id: &str) -> ApiEnvelope<()> {
        ApiEnvelope::from_result(self.delete_entry(id))
    }

    async fn toggle_history_star(&self, id: &str) -> ApiEnvelope<HistoryEntry> {
        ApiEnvelope::from_result(self.toggle_star(id))
    }

    async fn clear_all_history(&self) -> ApiEnvelope<()> {
        ApiEnvelope::from_result(self.clear_entries())
    }

    async fn import_history(&self, entries: &[HistoryEntry]) -> ApiEnvelope<usize> {
        ApiEnvelope::from_result(self.replace_all(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_core::ports::api_client::CODE_NOT_FOUND;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db").join("history.db");

        let client = SqliteHistoryClient::open(&path).unwrap();
        let saved = client
            .add_to_history(&HistoryEntry::new("GET", "https://a"))
            .await
            .into_result()
            .unwrap();
        drop(client);

        let reopened = SqliteHistoryClient::open(&path).unwrap();
        let history = reopened.get_history().await.into_result().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, saved.id);
        assert!(reopened
            .resolve_base_url()
            .await
            .unwrap()
            .starts_with("sqlite://"));
    }

    #[tokio::test]
    async fn envelope_contract() {
        let client = SqliteHistoryClient::open_in_memory().unwrap();
        assert!(client.health().await.success);

        let envelope = client.delete_history("missing").await;
        assert!(!envelope.success);
        assert_eq!(envelope.code.as_deref(), Some(CODE_NOT_FOUND));
    }
}
