//! 데이터베이스 저장소 어댑터.
//!
//! `HistoryApiClient` 포트를 감싸 원격 관계형 테이블에 CRUD를 수행한다.
//! 모든 연산은 독립된 왕복 요청이며 클라이언트 측 문서 잠금은 없다 (일관성은 서버 책임).
//! 백업은 원격 컬렉션을 내보내 로컬 순환 보관소에 저장한다.

use apiary_core::error::CoreError;
use apiary_core::models::backup::{BackupInfo, BackupSnapshot, ExportEnvelope};
use apiary_core::models::history::{HistoryEntry, HistoryEntryUpdate};
use apiary_core::models::report::{ConnectionStatus, StorageStats};
use apiary_core::models::storage::StorageKind;
use apiary_core::ports::api_client::HistoryApiClient;
use apiary_core::ports::history_storage::HistoryStorage;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backup::BackupRotation;

/// 데이터베이스 저장소: `HistoryStorage` 포트 구현
pub struct DatabaseStorage {
    client: Arc<dyn HistoryApiClient>,
    backups: BackupRotation,
    probe_timeout: Duration,
}

impl DatabaseStorage {
    /// 새 어댑터 생성
    pub fn new(
        client: Arc<dyn HistoryApiClient>,
        backups: BackupRotation,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            client,
            backups,
            probe_timeout,
        }
    }

    /// 제한 시간 내 라이브니스 프로브: 네트워크 실패도 에러 대신 상태로 반환
    pub async fn get_connection_status(&self) -> ConnectionStatus {
        let started = Instant::now();
        let probe = async {
            let endpoint = self.client.resolve_base_url().await?;
            self.client.health().await.into_result()?;
            Ok::<_, CoreError>(endpoint)
        };

        let (connected, endpoint, error) =
            match tokio::time::timeout(self.probe_timeout, probe).await {
                Ok(Ok(endpoint)) => (true, endpoint, None),
                Ok(Err(e)) => (false, self.endpoint_hint().await, Some(e.to_string())),
                Err(_) => (
                    false,
                    self.endpoint_hint().await,
                    Some(format!(
                        "{}ms 내 응답 없음",
                        self.probe_timeout.as_millis()
                    )),
                ),
            };

        let latency_ms = connected.then(|| started.elapsed().as_millis() as u64);
        if let Some(error) = &error {
            debug!("데이터베이스 프로브 실패: {endpoint}: {error}");
        }

        ConnectionStatus {
            connected,
            endpoint,
            latency_ms,
            checked_at: Utc::now(),
            error,
        }
    }

    async fn endpoint_hint(&self) -> String {
        match tokio::time::timeout(self.probe_timeout, self.client.resolve_base_url()).await {
            Ok(Ok(endpoint)) => endpoint,
            _ => "unresolved".to_string(),
        }
    }

    /// NOT_FOUND 응답을 요청한 ID로 다시 표기
    fn with_id(id: &str) -> impl Fn(CoreError) -> CoreError + '_ {
        move |e| {
            if e.is_not_found() {
                CoreError::entry_not_found(id)
            } else {
                e
            }
        }
    }
}

#[async_trait]
impl HistoryStorage for DatabaseStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Database
    }

    async fn initialize(&self) -> Result<(), CoreError> {
        let status = self.get_connection_status().await;
        if !status.connected {
            let reason = status.error.unwrap_or_else(|| "알 수 없는 이유".to_string());
            return Err(CoreError::Connection(format!(
                "데이터베이스 연결 실패 ({}): {reason}",
                status.endpoint
            )));
        }
        info!(
            "데이터베이스 저장소 초기화: {} ({}ms)",
            status.endpoint,
            status.latency_ms.unwrap_or_default()
        );
        Ok(())
    }

    async fn get_history(&self) -> Result<Vec<HistoryEntry>, CoreError> {
        self.client.get_history().await.into_result()
    }

    async fn add_history_entry(&self, entry: HistoryEntry) -> Result<HistoryEntry, CoreError> {
        let saved = self.client.add_to_history(&entry).await.into_result()?;
        debug!("히스토리 추가 (database): id={}", saved.id);
        Ok(saved)
    }

    async fn update_history_entry(
        &self,
        id: &str,
        updates: &HistoryEntryUpdate,
    ) -> Result<HistoryEntry, CoreError> {
        self.client
            .update_history(id, updates)
            .await
            .into_result()
            .map_err(Self::with_id(id))
    }

    async fn delete_history_entry(&self, id: &str) -> Result<(), CoreError> {
        self.client
            .delete_history(id)
            .await
            .into_result()
            .map_err(Self::with_id(id))
    }

    async fn toggle_history_star(&self, id: &str) -> Result<HistoryEntry, CoreError> {
        self.client
            .toggle_history_star(id)
            .await
            .into_result()
            .map_err(Self::with_id(id))
    }

    async fn clear_all_history(&self) -> Result<(), CoreError> {
        self.client.clear_all_history().await.into_result()?;
        info!("데이터베이스 히스토리 전체 삭제");
        Ok(())
    }

    async fn import_history(&self, envelope: &ExportEnvelope) -> Result<usize, CoreError> {
        envelope.validate()?;
        let count = self
            .client
            .import_history(&envelope.history)
            .await
            .into_result()?;
        info!(
            "데이터베이스 히스토리 가져오기: {count} 항목 (원본: {})",
            envelope.source
        );
        Ok(count)
    }

    async fn create_backup(&self) -> Result<BackupInfo, CoreError> {
        let history = self.get_history().await?;
        let snapshot = BackupSnapshot::new(StorageKind::Database, history);
        self.backups.save(&snapshot).await
    }

    async fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        self.backups.list().await
    }

    async fn restore_backup(&self, backup_id: &str) -> Result<usize, CoreError> {
        let snapshot = self.backups.load(backup_id).await?;
        let count = self
            .client
            .import_history(&snapshot.history)
            .await
            .into_result()?;
        info!("데이터베이스 백업 복원: {backup_id} ({count} 항목)");
        Ok(count)
    }

    async fn get_stats(&self) -> Result<StorageStats, CoreError> {
        let history = self.get_history().await?;
        let mut stats = StorageStats::from_entries(StorageKind::Database, &history);
        stats.backup_count = match self.backups.count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("백업 수 조회 실패: {e}");
                0
            }
        };
        Ok(stats)
    }

    async fn test_connection(&self) -> bool {
        self.get_connection_status().await.connected
    }
}
