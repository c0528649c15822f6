//! 저장소 파사드 (StorageInterface).
//!
//! 모든 히스토리 연산을 현재 활성 어댑터로 라우팅하고,
//! 백엔드 전환과 백엔드 간 마이그레이션을 조율한다.
//!
//! - 초기화 전 호출은 `CoreError::NotInitialized`
//! - 전환 실패 시 기존 활성 어댑터는 그대로 유지 (부분 전환 없음)
//! - 마이그레이션: 초기화 → 내보내기 → 대상 백업(경고만) → 가져오기 → 전환

use apiary_core::error::CoreError;
use apiary_core::models::backup::{BackupInfo, ExportEnvelope};
use apiary_core::models::history::{HistoryEntry, HistoryEntryUpdate};
use apiary_core::models::report::{BackendHealth, HealthReport, MigrationReport, StorageStats};
use apiary_core::models::storage::{MigrationStep, StorageKind};
use apiary_core::ports::history_storage::HistoryStorage;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config_store::ConfigStore;

/// 백엔드 종류별 어댑터
#[derive(Clone)]
pub struct StorageAdapters {
    pub json: Arc<dyn HistoryStorage>,
    pub database: Arc<dyn HistoryStorage>,
}

impl StorageAdapters {
    /// 종류에 해당하는 어댑터
    pub fn get(&self, kind: StorageKind) -> &Arc<dyn HistoryStorage> {
        match kind {
            StorageKind::Json => &self.json,
            StorageKind::Database => &self.database,
        }
    }
}

/// 활성 어댑터
#[derive(Clone)]
struct Active {
    kind: StorageKind,
    adapter: Arc<dyn HistoryStorage>,
}

/// 저장소 파사드
pub struct StorageInterface {
    adapters: StorageAdapters,
    config: Arc<ConfigStore>,
    active: RwLock<Option<Active>>,
    /// 초기화/전환 직렬화
    switch_lock: Mutex<()>,
}

impl StorageInterface {
    pub fn new(adapters: StorageAdapters, config: Arc<ConfigStore>) -> Self {
        Self {
            adapters,
            config,
            active: RwLock::new(None),
            switch_lock: Mutex::new(()),
        }
    }

    /// 설정 저장소 참조
    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// 초기화 여부
    pub fn is_initialized(&self) -> bool {
        self.active.read().is_some()
    }

    /// 현재 활성 백엔드 종류
    pub fn active_kind(&self) -> Result<StorageKind, CoreError> {
        self.active
            .read()
            .as_ref()
            .map(|a| a.kind)
            .ok_or(CoreError::NotInitialized)
    }

    fn active(&self) -> Result<Arc<dyn HistoryStorage>, CoreError> {
        self.active
            .read()
            .as_ref()
            .map(|a| a.adapter.clone())
            .ok_or(CoreError::NotInitialized)
    }

    fn set_active(&self, kind: StorageKind) {
        *self.active.write() = Some(Active {
            kind,
            adapter: self.adapters.get(kind).clone(),
        });
    }

    /// 파사드 초기화
    ///
    /// 설정된(또는 첫 실행 시 결정된) 백엔드를 초기화한다.
    /// 데이터베이스 초기화가 실패하면 JSON으로 자동 폴백하고 사유를 기록한다.
    /// 이미 초기화되었으면 현재 종류를 그대로 반환한다.
    pub async fn initialize(&self) -> Result<StorageKind, CoreError> {
        let _guard = self.switch_lock.lock().await;
        if let Ok(kind) = self.active_kind() {
            return Ok(kind);
        }

        let kind = self
            .config
            .initialize_storage(self.adapters.database.as_ref())
            .await?;

        match self.adapters.get(kind).initialize().await {
            Ok(()) => {
                self.set_active(kind);
                info!("저장소 파사드 초기화 완료: {kind}");
                self.run_scheduled_backup(kind).await;
                Ok(kind)
            }
            Err(e) if kind != StorageKind::Json => {
                warn!("{kind} 저장소 초기화 실패, json으로 폴백: {e}");
                self.adapters.json.initialize().await?;
                self.set_active(StorageKind::Json);
                if let Err(persist_err) = self
                    .config
                    .record_fallback(StorageKind::Json, e.to_string())
                    .await
                {
                    warn!("폴백 기록 저장 실패: {persist_err}");
                }
                self.run_scheduled_backup(StorageKind::Json).await;
                Ok(StorageKind::Json)
            }
            Err(e) => {
                error!("json 저장소 초기화 실패: {e}");
                Err(e)
            }
        }
    }

    /// 주기 백업: 가장 최근 백업이 설정한 주기보다 오래되었으면 새로 만든다
    ///
    /// 빈 컬렉션은 백업하지 않는다. 실패는 경고만 남긴다.
    async fn run_scheduled_backup(&self, kind: StorageKind) {
        let config = self.config.snapshot();
        if config.backup_interval(kind).is_none() {
            return;
        }
        let adapter = self.adapters.get(kind);

        let newest = match adapter.list_backups().await {
            Ok(backups) => backups.iter().map(|b| b.timestamp).max(),
            Err(e) => {
                warn!("{kind} 백업 목록 조회 실패, 주기 백업 건너뜀: {e}");
                return;
            }
        };
        if !config.is_backup_due(kind, newest, Utc::now()) {
            return;
        }

        match adapter.get_history().await {
            Ok(history) if history.is_empty() => return,
            Ok(_) => {}
            Err(e) => {
                warn!("{kind} 히스토리 조회 실패, 주기 백업 건너뜀: {e}");
                return;
            }
        }

        match adapter.create_backup().await {
            Ok(info) => info!("{kind} 주기 백업 생성: {} ({} 항목)", info.id, info.entry_count),
            Err(e) => warn!("{kind} 주기 백업 실패: {e}"),
        }
    }

    /// 활성 백엔드 전환
    ///
    /// 대상 어댑터 초기화와 설정 저장이 모두 성공해야만 활성 어댑터가 바뀐다.
    pub async fn switch_to_storage_type(&self, kind: StorageKind) -> Result<(), CoreError> {
        let _guard = self.switch_lock.lock().await;
        let previous = self.active_kind()?;

        if let Err(e) = self.adapters.get(kind).initialize().await {
            warn!("{kind} 저장소로 전환 실패, {previous} 유지: {e}");
            return Err(e);
        }
        self.config.set_storage_kind(kind).await?;
        self.set_active(kind);

        info!("저장소 전환: {previous} → {kind}");
        Ok(())
    }

    // ============================================================
    // 히스토리 연산 (활성 어댑터로 위임)
    // ============================================================

    pub async fn get_history(&self) -> Result<Vec<HistoryEntry>, CoreError> {
        self.active()?.get_history().await
    }

    pub async fn add_history_entry(&self, entry: HistoryEntry) -> Result<HistoryEntry, CoreError> {
        self.active()?.add_history_entry(entry).await
    }

    pub async fn update_history_entry(
        &self,
        id: &str,
        updates: &HistoryEntryUpdate,
    ) -> Result<HistoryEntry, CoreError> {
        self.active()?.update_history_entry(id, updates).await
    }

    pub async fn delete_history_entry(&self, id: &str) -> Result<(), CoreError> {
        self.active()?.delete_history_entry(id).await
    }

    pub async fn toggle_history_star(&self, id: &str) -> Result<HistoryEntry, CoreError> {
        self.active()?.toggle_history_star(id).await
    }

    pub async fn clear_all_history(&self) -> Result<(), CoreError> {
        self.active()?.clear_all_history().await
    }

    pub async fn export_history(&self) -> Result<ExportEnvelope, CoreError> {
        self.active()?.export_history().await
    }

    pub async fn import_history(&self, envelope: &ExportEnvelope) -> Result<usize, CoreError> {
        self.active()?.import_history(envelope).await
    }

    pub async fn create_backup(&self) -> Result<BackupInfo, CoreError> {
        self.active()?.create_backup().await
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        self.active()?.list_backups().await
    }

    pub async fn restore_backup(&self, backup_id: &str) -> Result<usize, CoreError> {
        self.active()?.restore_backup(backup_id).await
    }

    pub async fn get_storage_stats(&self) -> Result<StorageStats, CoreError> {
        self.active()?.get_stats().await
    }

    // ============================================================
    // 마이그레이션
    // ============================================================

    /// 백엔드 간 전체 이전 후 대상 백엔드로 전환
    ///
    /// 초기화/내보내기/가져오기/전환 단계 중 하나라도 실패하면 활성 백엔드는 바뀌지 않으며,
    /// 에러는 실패한 단계를 담은 `CoreError::Migration`이다.
    /// 대상 백업 실패는 `MigrationReport::warnings`에 기록만 한다.
    pub async fn migrate_data(
        &self,
        from: StorageKind,
        to: StorageKind,
    ) -> Result<MigrationReport, CoreError> {
        if from == to {
            return Err(CoreError::InvalidMigration { kind: from });
        }
        self.active_kind()?;

        let started_at = Utc::now();
        let source = self.adapters.get(from).clone();
        let target = self.adapters.get(to).clone();
        let step_error = |step: MigrationStep| {
            move |e: CoreError| {
                error!("마이그레이션 실패 ({step}, {from} → {to}): {e}");
                CoreError::Migration {
                    step,
                    from,
                    to,
                    source: Box::new(e),
                }
            }
        };

        info!("마이그레이션 시작: {from} → {to}");

        // 1. 양쪽 어댑터 초기화
        source
            .initialize()
            .await
            .map_err(step_error(MigrationStep::InitializeSource))?;
        target
            .initialize()
            .await
            .map_err(step_error(MigrationStep::InitializeTarget))?;

        // 2. 원본 내보내기
        let envelope = source
            .export_history()
            .await
            .map_err(step_error(MigrationStep::ExportSource))?;
        debug!("원본 내보내기: {} 항목", envelope.len());

        // 3. 대상 기존 데이터 백업
        let mut warnings = Vec::new();
        let backup = match target.create_backup().await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("대상 백업 실패, 계속 진행: {e}");
                warnings.push(format!("{}: {e}", MigrationStep::BackupTarget));
                None
            }
        };

        // 4. 대상으로 가져오기
        let migrated_entries = target
            .import_history(&envelope)
            .await
            .map_err(step_error(MigrationStep::ImportTarget))?;

        // 5. 활성 백엔드 전환
        self.switch_to_storage_type(to)
            .await
            .map_err(step_error(MigrationStep::SwitchActive))?;

        info!("마이그레이션 완료: {from} → {to}, {migrated_entries} 항목");
        Ok(MigrationReport {
            from,
            to,
            migrated_entries,
            backup,
            warnings,
            started_at,
            finished_at: Utc::now(),
        })
    }

    // ============================================================
    // 상태 점검
    // ============================================================

    /// 백엔드별 가용성과 활성 상태 점검
    ///
    /// 진단용이므로 초기화 전에도 호출할 수 있다 (`initialized = false`).
    pub async fn health_check(&self) -> HealthReport {
        let availability = self
            .config
            .check_availability(self.adapters.database.as_ref())
            .await;
        let active_kind = self.active_kind().ok();
        let initialized = active_kind.is_some();

        let backends: Vec<BackendHealth> = StorageKind::ALL
            .iter()
            .map(|&kind| {
                let status = availability.get(kind);
                BackendHealth {
                    kind,
                    available: status.available,
                    active: active_kind == Some(kind),
                    message: status.message.clone(),
                }
            })
            .collect();

        let reported_kind = active_kind.unwrap_or_else(|| self.config.get_current_storage_kind());
        let healthy = initialized && availability.get(reported_kind).available;

        HealthReport {
            active_kind: reported_kind,
            initialized,
            healthy,
            backends,
            checked_at: Utc::now(),
        }
    }
}
