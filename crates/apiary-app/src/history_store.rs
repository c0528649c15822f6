//! 히스토리 캐시 (HistoryStore).
//!
//! UI가 직접 사용하는 유일한 컴포넌트. 저장소 파사드 위에 목록 캐시와
//! 로딩/에러 상태를 유지한다. 백엔드 호출이 성공하면 캐시는 항상 전체 재조회로
//! 교체되며 부분 패치하지 않는다.

use apiary_core::error::CoreError;
use apiary_core::models::backup::{BackupInfo, ExportEnvelope};
use apiary_core::models::history::{HistoryEntry, HistoryEntryUpdate};
use apiary_core::models::report::MigrationReport;
use apiary_core::models::storage::StorageKind;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::storage_interface::StorageInterface;

/// 캐시 상태
#[derive(Debug, Clone, Default)]
pub struct HistoryState {
    /// 최신 항목이 앞에 오는 목록
    pub history: Vec<HistoryEntry>,
    pub is_loading: bool,
    /// UI에 표시할 마지막 에러 메시지
    pub error: Option<String>,
}

/// 추가 진행 플래그 해제 가드
struct AddingGuard<'a>(&'a AtomicBool);

impl Drop for AddingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 히스토리 캐시
pub struct HistoryStore {
    storage: Arc<StorageInterface>,
    init: OnceCell<StorageKind>,
    state: RwLock<HistoryState>,
    is_adding_history: AtomicBool,
}

impl HistoryStore {
    pub fn new(storage: Arc<StorageInterface>) -> Self {
        Self {
            storage,
            init: OnceCell::new(),
            state: RwLock::new(HistoryState::default()),
            is_adding_history: AtomicBool::new(false),
        }
    }

    /// 파사드 참조
    pub fn storage(&self) -> &Arc<StorageInterface> {
        &self.storage
    }

    /// 캐시 상태 (복제본)
    pub fn state(&self) -> HistoryState {
        self.state.read().clone()
    }

    /// 캐시된 목록
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.read().history.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn is_adding_history(&self) -> bool {
        self.is_adding_history.load(Ordering::SeqCst)
    }

    /// 에러 표시 해제
    pub fn clear_error(&self) {
        self.state.write().error = None;
    }

    /// 파사드 지연 초기화 (성공할 때까지 한 번만 수행)
    async fn ensure_initialized(&self) -> Result<StorageKind, CoreError> {
        self.init
            .get_or_try_init(|| self.storage.initialize())
            .await
            .copied()
    }

    /// 히스토리 조회 및 캐시 교체
    ///
    /// 실패해도 에러를 반환하지 않는다. 빈 목록과 에러 메시지로 상태를 표시한다.
    pub async fn fetch_history(&self) -> Vec<HistoryEntry> {
        self.state.write().is_loading = true;

        let result = match self.ensure_initialized().await {
            Ok(_) => self.storage.get_history().await,
            Err(e) => Err(e),
        };

        let mut state = self.state.write();
        state.is_loading = false;
        match result {
            Ok(history) => {
                debug!("히스토리 캐시 갱신: {} 항목", history.len());
                state.history = history;
                state.error = None;
            }
            Err(e) => {
                warn!("히스토리 조회 실패: {e}");
                state.history = Vec::new();
                state.error = Some(format!("히스토리를 불러오지 못했습니다: {e}"));
            }
        }
        state.history.clone()
    }

    /// 히스토리 항목 추가
    ///
    /// 같은 인스턴스에서 추가가 진행 중이면 아무것도 하지 않고 `Ok(None)`을 반환한다.
    pub async fn add_history_entry(
        &self,
        entry: HistoryEntry,
    ) -> Result<Option<HistoryEntry>, CoreError> {
        if self
            .is_adding_history
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("히스토리 추가 진행 중, 중복 요청 무시");
            return Ok(None);
        }
        let _guard = AddingGuard(&self.is_adding_history);

        let kind = self.ensure_initialized().await?;
        match self.storage.add_history_entry(entry).await {
            Ok(saved) => {
                self.fetch_history().await;
                Ok(Some(saved))
            }
            Err(e) => {
                let active = self.storage.active_kind().unwrap_or(kind);
                warn!("히스토리 저장 실패 ({active}): {e}");
                self.state.write().error = Some(format!(
                    "히스토리를 저장하지 못했습니다. {} 저장소로 전환해 보세요: {e}",
                    active.other()
                ));
                Err(e)
            }
        }
    }

    /// 백엔드 호출 후 성공하면 전체 재조회, 실패하면 에러 표시
    async fn mutate<T, Fut>(&self, action: &str, call: Fut) -> Result<T, CoreError>
    where
        Fut: Future<Output = Result<T, CoreError>>,
    {
        self.ensure_initialized().await?;
        match call.await {
            Ok(value) => {
                self.fetch_history().await;
                Ok(value)
            }
            Err(e) => {
                warn!("{action} 실패: {e}");
                self.state.write().error = Some(format!("{action} 실패: {e}"));
                Err(e)
            }
        }
    }

    pub async fn update_history_entry(
        &self,
        id: &str,
        updates: &HistoryEntryUpdate,
    ) -> Result<HistoryEntry, CoreError> {
        self.mutate(
            "히스토리 수정",
            self.storage.update_history_entry(id, updates),
        )
        .await
    }

    pub async fn delete_history_entry(&self, id: &str) -> Result<(), CoreError> {
        self.mutate("히스토리 삭제", self.storage.delete_history_entry(id))
            .await
    }

    pub async fn toggle_history_star(&self, id: &str) -> Result<HistoryEntry, CoreError> {
        self.mutate("즐겨찾기 변경", self.storage.toggle_history_star(id))
            .await
    }

    pub async fn clear_all_history(&self) -> Result<(), CoreError> {
        self.mutate("히스토리 전체 삭제", self.storage.clear_all_history())
            .await
    }

    pub async fn import_history(&self, envelope: &ExportEnvelope) -> Result<usize, CoreError> {
        self.mutate("히스토리 가져오기", self.storage.import_history(envelope))
            .await
    }

    pub async fn restore_backup(&self, backup_id: &str) -> Result<usize, CoreError> {
        self.mutate("백업 복원", self.storage.restore_backup(backup_id))
            .await
    }

    /// 백엔드 전환 후 전체 재조회
    pub async fn switch_storage_type(&self, kind: StorageKind) -> Result<(), CoreError> {
        self.mutate(
            "저장소 전환",
            self.storage.switch_to_storage_type(kind),
        )
        .await
    }

    /// 백엔드 간 마이그레이션 후 전체 재조회
    pub async fn migrate_data(
        &self,
        from: StorageKind,
        to: StorageKind,
    ) -> Result<MigrationReport, CoreError> {
        self.mutate("마이그레이션", self.storage.migrate_data(from, to))
            .await
    }

    pub async fn export_history(&self) -> Result<ExportEnvelope, CoreError> {
        self.ensure_initialized().await?;
        self.storage.export_history().await
    }

    pub async fn create_backup(&self) -> Result<BackupInfo, CoreError> {
        self.ensure_initialized().await?;
        self.storage.create_backup().await
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>, CoreError> {
        self.ensure_initialized().await?;
        self.storage.list_backups().await
    }
}
