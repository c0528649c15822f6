//! HTTP REST 히스토리 클라이언트.
//!
//! `HistoryApiClient` 포트 구현. 모든 응답 본문은 `{success, data, error, code}` 봉투이며,
//! 봉투가 아닌 404는 `NOT_FOUND`, 전송 실패는 `CONNECTION`으로 변환한다.
//! 재시도 로직은 없다 (재시도는 사용자의 명시적 동작).

use apiary_core::config::ServerConfig;
use apiary_core::error::CoreError;
use apiary_core::models::history::{HistoryEntry, HistoryEntryUpdate};
use apiary_core::ports::api_client::{
    ApiEnvelope, HistoryApiClient, CODE_INTERNAL, CODE_INVALID_REQUEST, CODE_NOT_FOUND,
};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// 기본 엔드포인트 해석 방식
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// 고정 URL
    Fixed(String),
    /// 데스크톱 셸이 기록하는 포트 파일: `http://127.0.0.1:<port>/api`
    ///
    /// 파일이 아직 없으면 `fallback` URL을 사용한다.
    PortFile { path: PathBuf, fallback: String },
}

impl Endpoint {
    /// 서버 설정으로부터 생성
    pub fn from_config(server: &ServerConfig) -> Self {
        match &server.port_file {
            Some(path) => Endpoint::PortFile {
                path: path.clone(),
                fallback: server.base_url.clone(),
            },
            None => Endpoint::Fixed(server.base_url.clone()),
        }
    }

    async fn resolve(&self) -> Result<String, CoreError> {
        match self {
            Endpoint::Fixed(url) => Ok(url.trim_end_matches('/').to_string()),
            Endpoint::PortFile { path, fallback } => {
                let content = match tokio::fs::read_to_string(path).await {
                    Ok(content) => content,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!("포트 파일 없음, 기본 URL 사용: {}", path.display());
                        return Ok(fallback.trim_end_matches('/').to_string());
                    }
                    Err(e) => {
                        return Err(CoreError::Connection(format!(
                            "포트 파일 읽기 실패: {}: {e}",
                            path.display()
                        )))
                    }
                };

                let port: u16 = content.trim().parse().map_err(|e| {
                    CoreError::Connection(format!(
                        "포트 파일 형식 오류: {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(format!("http://127.0.0.1:{port}/api"))
            }
        }
    }
}

/// REST 히스토리 클라이언트: `HistoryApiClient` 포트 구현
pub struct HttpHistoryClient {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl HttpHistoryClient {
    /// 새 HTTP 클라이언트 생성
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Internal(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self { client, endpoint })
    }

    /// 서버 설정으로부터 생성
    pub fn from_config(server: &ServerConfig) -> Result<Self, CoreError> {
        Self::new(Endpoint::from_config(server), server.request_timeout())
    }

    /// 기본 URL 뒤에 경로 세그먼트 추가 (세그먼트는 퍼센트 인코딩)
    async fn url_for(&self, segments: &[&str]) -> Result<Url, CoreError> {
        let base = self.endpoint.resolve().await?;
        let mut url = Url::parse(&base)
            .map_err(|e| CoreError::Connection(format!("잘못된 서버 URL: {base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CoreError::Connection(format!("경로를 붙일 수 없는 서버 URL: {base}")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// 요청 실행: 상태 코드와 본문 텍스트 반환
    async fn execute(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> Result<(StatusCode, String), CoreError> {
        let url = self.url_for(segments).await?;
        debug!("{method} {url}");

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| CoreError::Connection(format!("{method} {url} 요청 실패: {e}")))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });
        Ok((status, text))
    }

    /// 데이터가 있는 요청
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<Value>,
    ) -> ApiEnvelope<T> {
        match self.execute(method, segments, body).await {
            Ok((status, text)) => decode(status, &text),
            Err(e) => ApiEnvelope::from_result(Err(e)),
        }
    }

    /// 데이터가 없는 요청: 성공 상태와 봉투의 `success`만 확인
    async fn send_unit(&self, method: Method, segments: &[&str]) -> ApiEnvelope<()> {
        let (status, text) = match self.execute(method, segments, None).await {
            Ok(response) => response,
            Err(e) => return ApiEnvelope::from_result(Err(e)),
        };

        match serde_json::from_str::<ApiEnvelope<Value>>(&text) {
            Ok(envelope) if envelope.success => ApiEnvelope::ok(()),
            Ok(envelope) => with_status_code(envelope.map(|_| ()), status),
            Err(_) if status.is_success() => ApiEnvelope::ok(()),
            Err(_) => status_failure(status, &text),
        }
    }
}

/// 본문을 봉투로 해석
fn decode<T: DeserializeOwned>(status: StatusCode, text: &str) -> ApiEnvelope<T> {
    match serde_json::from_str::<ApiEnvelope<T>>(text) {
        Ok(envelope) if envelope.success => envelope,
        Ok(envelope) => with_status_code(envelope, status),
        Err(e) if status.is_success() => {
            ApiEnvelope::failure(CODE_INTERNAL, format!("응답 파싱 실패: {e}"))
        }
        Err(_) => status_failure(status, text),
    }
}

/// 실패 봉투에 코드가 없으면 상태 코드로 채움
fn with_status_code<T>(mut envelope: ApiEnvelope<T>, status: StatusCode) -> ApiEnvelope<T> {
    if envelope.code.is_none() {
        envelope.code = Some(code_for_status(status).to_string());
    }
    envelope
}

/// 봉투가 아닌 실패 응답
fn status_failure<T>(status: StatusCode, text: &str) -> ApiEnvelope<T> {
    let message = if text.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", text.trim())
    };
    ApiEnvelope::failure(code_for_status(status), message)
}

fn code_for_status(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => CODE_NOT_FOUND,
        s if s.is_client_error() => CODE_INVALID_REQUEST,
        _ => CODE_INTERNAL,
    }
}

fn to_body<S: Serialize>(value: &S) -> Result<Value, CoreError> {
    Ok(serde_json::to_value(value)?)
}

#[async_trait]
impl HistoryApiClient for HttpHistoryClient {
    async fn resolve_base_url(&self) -> Result<String, CoreError> {
        self.endpoint.resolve().await
    }

    async fn health(&self) -> ApiEnvelope<()> {
        self.send_unit(Method::GET, &["health"]).await
    }

    async fn get_history(&self) -> ApiEnvelope<Vec<HistoryEntry>> {
        self.send(Method::GET, &["history"], None).await
    }

    async fn add_to_history(&self, entry: &HistoryEntry) -> ApiEnvelope<HistoryEntry> {
        match to_body(entry) {
            Ok(body) => self.send(Method::POST, &["history"], Some(body)).await,
            Err(e) => ApiEnvelope::from_result(Err(e)),
        }
    }

    async fn update_history(
        &self,
        id: &str,
        updates: &HistoryEntryUpdate,
    ) -> ApiEnvelope<HistoryEntry> {
        match to_body(updates) {
            Ok(body) => {
                self.send(Method::PUT, &["history", id], Some(body))
                    .await
            }
            Err(e) => ApiEnvelope::from_result(Err(e)),
        }
    }

    async fn delete_history(&self, id: &str) -> ApiEnvelope<()> {
        self.send_unit(Method::DELETE, &["history", id]).await
    }

    async fn toggle_history_star(&self, id: &str) -> ApiEnvelope<HistoryEntry> {
        self.send(Method::POST, &["history", id, "star"], None)
            .await
    }

    async fn clear_all_history(&self) -> ApiEnvelope<()> {
        self.send_unit(Method::DELETE, &["history"]).await
    }

    async fn import_history(&self, entries: &[HistoryEntry]) -> ApiEnvelope<usize> {
        match to_body(&entries) {
            Ok(history) => {
                let body = serde_json::json!({ "history": history });
                self.send(Method::POST, &["history", "import"], Some(body)).await
            }
            Err(e) => ApiEnvelope::from_result(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_core::ports::api_client::CODE_CONNECTION;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> HttpHistoryClient {
        HttpHistoryClient::new(
            Endpoint::Fixed(format!("{}/api/", server.url())),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    const ENTRY_JSON: &str = r#"{
        "id": "1718000000000_ab12cd34",
        "method": "GET",
        "url": "https://api.example.com/users",
        "headers": {"Accept": "application/json"},
        "response_status": 200,
        "response_time_ms": 42,
        "timestamp": "2024-06-10T06:13:20Z",
        "starred": false
    }"#;

    #[test]
    fn fixed_endpoint_trims_trailing_slash() {
        let endpoint = Endpoint::Fixed("http://localhost:3001/api/".to_string());
        let resolved = tokio_test::block_on(endpoint.resolve()).unwrap();
        assert_eq!(resolved, "http://localhost:3001/api");
    }

    #[tokio::test]
    async fn port_file_endpoint() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("port");
        let endpoint = Endpoint::PortFile {
            path: path.clone(),
            fallback: "http://localhost:3001/api".to_string(),
        };

        // 파일이 아직 없으면 기본 URL
        assert_eq!(endpoint.resolve().await.unwrap(), "http://localhost:3001/api");

        std::fs::write(&path, "45123\n").unwrap();
        assert_eq!(endpoint.resolve().await.unwrap(), "http://127.0.0.1:45123/api");

        std::fs::write(&path, "not-a-port").unwrap();
        assert!(endpoint.resolve().await.unwrap_err().is_connection());
    }

    #[test]
    fn endpoint_from_config() {
        let mut server = ServerConfig::default();
        assert_eq!(
            Endpoint::from_config(&server),
            Endpoint::Fixed("http://localhost:3001/api".to_string())
        );
        server.port_file = Some(PathBuf::from("/tmp/apiary.port"));
        assert!(matches!(
            Endpoint::from_config(&server),
            Endpoint::PortFile { .. }
        ));
    }

    #[tokio::test]
    async fn get_history_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/history")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"success":true,"data":[{ENTRY_JSON}]}}"#))
            .create_async()
            .await;

        let history = client_for(&server).get_history().await.into_result().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "1718000000000_ab12cd34");
        assert_eq!(history[0].response_status, Some(200));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn add_to_history_posts_entry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/history")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "method": "GET",
                "url": "https://api.example.com/users",
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"success":true,"data":{ENTRY_JSON}}}"#))
            .create_async()
            .await;

        let entry = HistoryEntry::new("GET", "https://api.example.com/users");
        let saved = client_for(&server)
            .add_to_history(&entry)
            .await
            .into_result()
            .unwrap();
        assert!(!saved.needs_id());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn envelope_failure_passes_through() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/history/h_1/star")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":false,"error":"History entry not found","code":"NOT_FOUND"}"#)
            .create_async()
            .await;

        let envelope = client_for(&server).toggle_history_star("h_1").await;
        assert!(!envelope.success);
        assert_eq!(envelope.code.as_deref(), Some(CODE_NOT_FOUND));
    }

    #[tokio::test]
    async fn plain_404_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/api/history/missing")
            .with_status(404)
            .with_body("Not Found")
            .create_async()
            .await;

        let err = client_for(&server)
            .delete_history("missing")
            .await
            .into_result()
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn server_error_without_code_is_internal() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PUT", "/api/history/h_1")
            .with_status(500)
            .with_body(r#"{"success":false,"error":"database locked"}"#)
            .create_async()
            .await;

        let envelope = client_for(&server)
            .update_history("h_1", &HistoryEntryUpdate::default())
            .await;
        assert_eq!(envelope.code.as_deref(), Some(CODE_INTERNAL));
        assert_eq!(envelope.error.as_deref(), Some("database locked"));
    }

    #[tokio::test]
    async fn health_accepts_plain_ok_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/health")
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        assert!(client_for(&server).health().await.success);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn import_sends_whole_collection() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/history/import")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "history": [{"id": "a"}, {"id": "b"}],
            })))
            .with_status(200)
            .with_body(r#"{"success":true,"data":2}"#)
            .create_async()
            .await;

        let entries = vec![
            HistoryEntry::new("GET", "https://a").with_id("a"),
            HistoryEntry::new("GET", "https://b").with_id("b"),
        ];
        let count = client_for(&server)
            .import_history(&entries)
            .await
            .into_result()
            .unwrap();
        assert_eq!(count, 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn clear_all_history() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/history")
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"deleted":12}}"#)
            .create_async()
            .await;

        assert!(client_for(&server).clear_all_history().await.success);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_failure() {
        // 바인드 후 즉시 닫아 연결이 거부되는 포트 확보
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = HttpHistoryClient::new(
            Endpoint::Fixed(format!("http://127.0.0.1:{port}/api")),
            Duration::from_secs(2),
        )
        .unwrap();

        let envelope = client.get_history().await;
        assert!(!envelope.success);
        assert_eq!(envelope.code.as_deref(), Some(CODE_CONNECTION));
        assert!(!client.health().await.success);
    }

    #[tokio::test]
    async fn malformed_success_body_is_internal() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/history")
            .with_status(200)
            .with_body("<html>proxy</html>")
            .create_async()
            .await;

        let err = client_for(&server)
            .get_history()
            .await
            .into_result()
            .unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[tokio::test]
    async fn reserved_characters_in_id_stay_in_one_segment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/history/a%2Fb%3Fc%23d")
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;
        let client = client_for(&server);

        let url = client.url_for(&["history", "a/b?c#d", "star"]).await.unwrap();
        assert_eq!(url.path(), "/api/history/a%2Fb%3Fc%23d/star");
        assert!(url.query().is_none());

        assert!(client.delete_history("a/b?c#d").await.success);
        mock.assert_async().await;
    }
}
