//! 히스토리 API 클라이언트 포트.
//!
//! 구현: `apiary-network` crate (reqwest, 원격 REST API),
//! `apiary-storage` crate (`SqliteHistoryClient`, 임베디드 관계형 저장소)
//!
//! 모든 호출은 `{success, data|error}` 형태의 균일한 봉투를 반환하며
//! 데이터베이스 어댑터가 이를 그대로 소비한다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::history::{HistoryEntry, HistoryEntryUpdate};

/// 항목 미발견
pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
/// 전송/연결 실패
pub const CODE_CONNECTION: &str = "CONNECTION";
/// 잘못된 요청
pub const CODE_INVALID_REQUEST: &str = "INVALID_REQUEST";
/// 서버 내부 실패
pub const CODE_INTERNAL: &str = "INTERNAL";

/// API 응답 봉투
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    /// 성공 여부
    pub success: bool,
    /// 성공 시 데이터
    #[serde(default)]
    pub data: Option<T>,
    /// 실패 시 메시지
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 실패 코드 (`NOT_FOUND`, `CONNECTION`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// 성공 봉투
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    /// 실패 봉투
    pub fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: Some(code.to_string()),
        }
    }

    /// 항목 미발견 봉투
    pub fn not_found(id: &str) -> Self {
        Self::failure(CODE_NOT_FOUND, format!("history entry not found: {id}"))
    }

    /// 연결 실패 봉투
    pub fn connection(message: impl Into<String>) -> Self {
        Self::failure(CODE_CONNECTION, message)
    }

    /// `Result`를 봉투로 변환 (서버/임베디드 구현 측)
    pub fn from_result(result: Result<T, CoreError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(CoreError::NotFound { id, .. }) => Self::not_found(&id),
            Err(CoreError::Connection(message)) => Self::connection(message),
            Err(e @ CoreError::Validation { .. }) => {
                Self::failure(CODE_INVALID_REQUEST, e.to_string())
            }
            Err(e) => Self::failure(CODE_INTERNAL, e.to_string()),
        }
    }

    /// 데이터 변환
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiEnvelope<U> {
        ApiEnvelope {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            code: self.code,
        }
    }

    /// 봉투를 `Result`로 변환
    pub fn into_result(self) -> Result<T, CoreError> {
        if self.success {
            return self
                .data
                .ok_or_else(|| CoreError::Internal("성공 응답에 data가 없습니다".to_string()));
        }

        let message = self
            .error
            .unwrap_or_else(|| "알 수 없는 API 에러".to_string());
        match self.code.as_deref() {
            Some(CODE_NOT_FOUND) => Err(CoreError::NotFound {
                resource_type: "HistoryEntry".to_string(),
                id: message,
            }),
            Some(CODE_CONNECTION) => Err(CoreError::Connection(message)),
            Some(CODE_INVALID_REQUEST) => Err(CoreError::Validation {
                field: "request".to_string(),
                message,
            }),
            _ => Err(CoreError::Internal(format!("API 에러: {message}"))),
        }
    }
}

/// 관계형 히스토리 저장소에 대한 네트워크 클라이언트
#[async_trait]
pub trait HistoryApiClient: Send + Sync {
    /// 기본 엔드포인트 해석 (데스크톱 셸이 포트를 늦게 알려줄 수 있어 비동기)
    async fn resolve_base_url(&self) -> Result<String, CoreError>;

    /// 라이브니스 확인
    async fn health(&self) -> ApiEnvelope<()>;

    /// 전체 항목 조회 (최신 순)
    async fn get_history(&self) -> ApiEnvelope<Vec<HistoryEntry>>;

    /// 항목 추가: 서버가 저장한 항목 반환
    async fn add_to_history(&self, entry: &HistoryEntry) -> ApiEnvelope<HistoryEntry>;

    /// 항목 부분 업데이트
    async fn update_history(
        &self,
        id: &str,
        updates: &HistoryEntryUpdate,
    ) -> ApiEnvelope<HistoryEntry>;

    /// 항목 삭제
    async fn delete_history(&self, id: &str) -> ApiEnvelope<()>;

    /// 즐겨찾기 토글
    async fn toggle_history_star(&self, id: &str) -> ApiEnvelope<HistoryEntry>;

    /// 전체 삭제
    async fn clear_all_history(&self) -> ApiEnvelope<()>;

    /// 컬렉션 일괄 교체 (서버 측 원자적 처리): 저장된 항목 수 반환
    async fn import_history(&self, entries: &[HistoryEntry]) -> ApiEnvelope<usize>;
}
