//! 요청 히스토리 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 요청 히스토리 항목
///
/// 사용자가 실행한 HTTP 요청 하나와 그 응답 요약을 담는다.
/// 컬렉션은 삽입 순서 기준 최신 항목이 앞에 오며, `timestamp` 단조성은 보장하지 않는다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 백엔드 내 고유 ID (비어 있으면 저장 시 할당)
    #[serde(default)]
    pub id: String,
    /// HTTP 메서드 (GET, POST, ...)
    pub method: String,
    /// 요청 URL
    pub url: String,
    /// 요청 헤더
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// 요청 본문
    #[serde(default)]
    pub body: Option<String>,
    /// 응답 상태 코드
    #[serde(default)]
    pub response_status: Option<u16>,
    /// 응답 본문
    #[serde(default)]
    pub response_body: Option<String>,
    /// 응답 헤더
    #[serde(default)]
    pub response_headers: BTreeMap<String, String>,
    /// 응답 지연 (밀리초)
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    /// 요청 시각
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// 즐겨찾기 여부
    #[serde(default)]
    pub starred: bool,
    /// 요청을 보낸 탭 ID
    #[serde(default)]
    pub tab_id: Option<String>,
}

impl HistoryEntry {
    /// 새 히스토리 항목 생성 (ID 미할당)
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            response_status: None,
            response_body: None,
            response_headers: BTreeMap::new(),
            response_time_ms: None,
            timestamp: Utc::now(),
            starred: false,
            tab_id: None,
        }
    }

    /// 요청 헤더 추가
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// 요청 본문 설정
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// 응답 요약 설정
    pub fn with_response(
        mut self,
        status: u16,
        body: impl Into<String>,
        response_time_ms: u64,
    ) -> Self {
        self.response_status = Some(status);
        self.response_body = Some(body.into());
        self.response_time_ms = Some(response_time_ms);
        self
    }

    /// 탭 ID 설정
    pub fn with_tab(mut self, tab_id: impl Into<String>) -> Self {
        self.tab_id = Some(tab_id.into());
        self
    }

    /// ID 지정
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// 새 항목 ID 생성 (`<epoch 밀리초>_<랜덤 8자>`)
    ///
    /// 충돌 가능성이 낮을 뿐 암호학적으로 고유하지는 않다.
    pub fn generate_id() -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
    }

    /// ID 할당이 필요한지 여부
    pub fn needs_id(&self) -> bool {
        self.id.trim().is_empty()
    }

    /// ID/시각을 제외한 요청·응답 내용 비교
    pub fn same_content(&self, other: &HistoryEntry) -> bool {
        self.method == other.method
            && self.url == other.url
            && self.headers == other.headers
            && self.body == other.body
            && self.response_status == other.response_status
            && self.response_body == other.response_body
            && self.response_headers == other.response_headers
            && self.response_time_ms == other.response_time_ms
            && self.starred == other.starred
            && self.tab_id == other.tab_id
    }
}

/// 히스토리 항목 부분 업데이트
///
/// `None` 필드는 변경하지 않는다. ID는 변경할 수 없다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntryUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
}

impl HistoryEntryUpdate {
    /// 변경할 필드가 없는지 여부
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 항목에 업데이트 적용
    pub fn apply_to(&self, entry: &mut HistoryEntry) {
        if let Some(method) = &self.method {
            entry.method = method.clone();
        }
        if let Some(url) = &self.url {
            entry.url = url.clone();
        }
        if let Some(headers) = &self.headers {
            entry.headers = headers.clone();
        }
        if let Some(body) = &self.body {
            entry.body = Some(body.clone());
        }
        if let Some(status) = self.response_status {
            entry.response_status = Some(status);
        }
        if let Some(body) = &self.response_body {
            entry.response_body = Some(body.clone());
        }
        if let Some(headers) = &self.response_headers {
            entry.response_headers = headers.clone();
        }
        if let Some(ms) = self.response_time_ms {
            entry.response_time_ms = Some(ms);
        }
        if let Some(starred) = self.starred {
            entry.starred = starred;
        }
        if let Some(tab_id) = &self.tab_id {
            entry.tab_id = Some(tab_id.clone());
        }
    }
}
