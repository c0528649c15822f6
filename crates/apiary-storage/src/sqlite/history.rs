//! history 테이블 쿼리.
//!
//! 헤더 맵은 JSON 텍스트, 시각은 RFC3339 텍스트로 저장한다.

use apiary_core::error::CoreError;
use apiary_core::models::history::{HistoryEntry, HistoryEntryUpdate};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::MutexGuard;
use tracing::debug;

use super::SqliteHistoryClient;

const SELECT_COLUMNS: &str = "SELECT id, method, url, headers, body, response_status, \
     response_body, response_headers, response_time_ms, timestamp, starred, tab_id \
     FROM history";

/// DB 원시 행
struct HistoryRow {
    id: String,
    method: String,
    url: String,
    headers: String,
    body: Option<String>,
    response_status: Option<i64>,
    response_body: Option<String>,
    response_headers: String,
    response_time_ms: Option<i64>,
    timestamp: String,
    starred: bool,
    tab_id: Option<String>,
}

impl HistoryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            method: row.get(1)?,
            url: row.get(2)?,
            headers: row.get(3)?,
            body: row.get(4)?,
            response_status: row.get(5)?,
            response_body: row.get(6)?,
            response_headers: row.get(7)?,
            response_time_ms: row.get(8)?,
            timestamp: row.get(9)?,
            starred: row.get(10)?,
            tab_id: row.get(11)?,
        })
    }

    fn into_entry(self) -> Result<HistoryEntry, CoreError> {
        let headers: BTreeMap<String, String> = serde_json::from_str(&self.headers)?;
        let response_headers: BTreeMap<String, String> =
            serde_json::from_str(&self.response_headers)?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| CoreError::Internal(format!("시각 파싱 실패: {}: {e}", self.timestamp)))?
            .with_timezone(&Utc);

        Ok(HistoryEntry {
            id: self.id,
            method: self.method,
            url: self.url,
            headers,
            body: self.body,
            response_status: self.response_status.and_then(|s| u16::try_from(s).ok()),
            response_body: self.response_body,
            response_headers,
            response_time_ms: self.response_time_ms.and_then(|ms| u64::try_from(ms).ok()),
            timestamp,
            starred: self.starred,
            tab_id: self.tab_id,
        })
    }
}

impl SqliteHistoryClient {
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Internal(format!("잠금 획득 실패: {e}")))
    }

    /// 연결 확인
    pub(super) fn ping(&self) -> Result<(), CoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| CoreError::Internal(format!("SQLite 상태 확인 실패: {e}")))?;
        Ok(())
    }

    /// 전체 항목 (최신 순)
    pub(super) fn list_entries(&self) -> Result<Vec<HistoryEntry>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY seq DESC"))
            .map_err(|e| CoreError::Internal(format!("쿼리 준비 실패: {e}")))?;

        let rows = stmt
            .query_map([], HistoryRow::from_row)
            .map_err(|e| CoreError::Internal(format!("히스토리 조회 실패: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Internal(format!("행 읽기 실패: {e}")))?;

        rows.into_iter().map(HistoryRow::into_entry).collect()
    }

    /// 항목 추가: 비어 있거나 이미 쓰인 ID는 새로 할당
    pub(super) fn insert_entry(&self, entry: &HistoryEntry) -> Result<HistoryEntry, CoreError> {
        let conn = self.lock()?;
        let mut entry = entry.clone();
        if entry.needs_id() || find_entry(&conn, &entry.id)?.is_some() {
            entry.id = HistoryEntry::generate_id();
        }
        insert_row(&conn, &entry)?;
        debug!("SQLite 히스토리 추가: id={}", entry.id);
        Ok(entry)
    }

    /// 항목 부분 업데이트
    pub(super) fn update_entry(
        &self,
        id: &str,
        updates: &HistoryEntryUpdate,
    ) -> Result<HistoryEntry, CoreError> {
        let conn = self.lock()?;
        let mut entry = find_entry(&conn, id)?.ok_or_else(|| CoreError::entry_not_found(id))?;
        updates.apply_to(&mut entry);

        conn.execute(
            "UPDATE history SET method = ?2, url = ?3, headers = ?4, body = ?5,
                response_status = ?6, response_body = ?7, response_headers = ?8,
                response_time_ms = ?9, timestamp = ?10, starred = ?11, tab_id = ?12
             WHERE id = ?1",
            params![
                entry.id,
                entry.method,
                entry.url,
                serde_json::to_string(&entry.headers)?,
                entry.body,
                entry.response_status,
                entry.response_body,
                serde_json::to_string(&entry.response_headers)?,
                entry.response_time_ms.map(|ms| ms as i64),
                entry.timestamp.to_rfc3339(),
                entry.starred,
                entry.tab_id,
            ],
        )
        .map_err(|e| CoreError::Internal(format!("히스토리 업데이트 실패: {e}")))?;

        Ok(entry)
    }

    /// 항목 삭제
    pub(super) fn delete_entry(&self, id: &str) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let affected = conn
            .execute("DELETE FROM history WHERE id = ?1", params![id])
            .map_err(|e| CoreError::Internal(format!("히스토리 삭제 실패: {e}")))?;
        if affected == 0 {
            return Err(CoreError::entry_not_found(id));
        }
        Ok(())
    }

    /// 즐겨찾기 토글
    pub(super) fn toggle_star(&self, id: &str) -> Result<HistoryEntry, CoreError> {
        let conn = self.lock()?;
        let affected = conn
            .execute(
                "UPDATE history SET starred = 1 - starred WHERE id = ?1",
                params![id],
            )
            .map_err(|e| CoreError::Internal(format!("즐겨찾기 토글 실패: {e}")))?;
        if affected == 0 {
            return Err(CoreError::entry_not_found(id));
        }
        find_entry(&conn, id)?.ok_or_else(|| CoreError::entry_not_found(id))
    }

    /// 전체 삭제
    pub(super) fn clear_entries(&self) -> Result<(), CoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM history", [])
            .map_err(|e| CoreError::Internal(format!("히스토리 전체 삭제 실패: {e}")))?;
        Ok(())
    }

    /// 컬렉션 교체 (단일 트랜잭션)
    ///
    /// 입력은 최신 순이므로 역순으로 삽입해 첫 항목이 가장 큰 `seq`를 갖게 한다.
    pub(super) fn replace_all(&self, entries: &[HistoryEntry]) -> Result<usize, CoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Internal(format!("트랜잭션 시작 실패: {e}")))?;

        tx.execute("DELETE FROM history", [])
            .map_err(|e| CoreError::Internal(format!("히스토리 전체 삭제 실패: {e}")))?;

        for entry in entries.iter().rev() {
            let mut entry = entry.clone();
            if entry.needs_id() {
                entry.id = HistoryEntry::generate_id();
            }
            insert_row(&tx, &entry)?;
        }

        tx.commit()
            .map_err(|e| CoreError::Internal(format!("트랜잭션 커밋 실패: {e}")))?;

        debug!("SQLite 히스토리 교체: {} 항목", entries.len());
        Ok(entries.len())
    }
}

fn find_entry(conn: &Connection, id: &str) -> Result<Option<HistoryEntry>, CoreError> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE id = ?1"),
        params![id],
        HistoryRow::from_row,
    )
    .optional()
    .map_err(|e| CoreError::Internal(format!("히스토리 조회 실패: {e}")))?
    .map(HistoryRow::into_entry)
    .transpose()
}

fn insert_row(conn: &Connection, entry: &HistoryEntry) -> Result<(), CoreError> {
    conn.execute(
        "INSERT INTO history (id, method, url, headers, body, response_status, response_body,
            response_headers, response_time_ms, timestamp, starred, tab_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            entry.id,
            entry.method,
            entry.url,
            serde_json::to_string(&entry.headers)?,
            entry.body,
            entry.response_status,
            entry.response_body,
            serde_json::to_string(&entry.response_headers)?,
            entry.response_time_ms.map(|ms| ms as i64),
            entry.timestamp.to_rfc3339(),
            entry.starred,
            entry.tab_id,
        ],
    )
    .map_err(|e| CoreError::Internal(format!("히스토리 저장 실패: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SqliteHistoryClient {
        SqliteHistoryClient::open_in_memory().unwrap()
    }

    #[test]
    fn insert_preserves_all_fields() {
        let client = client();
        let entry = HistoryEntry::new("PUT", "https://api.example.com/users/1")
            .with_header("Authorization", "Bearer x")
            .with_body(r#"{"name":"a"}"#)
            .with_response(200, r#"{"ok":true}"#, 87)
            .with_tab("tab-3");
        let saved = client.insert_entry(&entry).unwrap();

        let history = client.list_entries().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, saved.id);
        assert!(history[0].same_content(&entry));
        assert_eq!(
            history[0].timestamp.timestamp_micros(),
            entry.timestamp.timestamp_micros()
        );
    }

    #[test]
    fn duplicate_id_is_reassigned() {
        let client = client();
        let entry = HistoryEntry::new("GET", "https://a").with_id("fixed");
        let first = client.insert_entry(&entry).unwrap();
        let second = client.insert_entry(&entry).unwrap();
        assert_eq!(first.id, "fixed");
        assert_ne!(second.id, "fixed");
        assert_eq!(client.list_entries().unwrap().len(), 2);
    }

    #[test]
    fn replace_all_keeps_order() {
        let client = client();
        client.insert_entry(&HistoryEntry::new("GET", "https://old")).unwrap();

        let entries: Vec<_> = (0..3)
            .map(|i| HistoryEntry::new("GET", format!("https://{i}")).with_id(format!("e{i}")))
            .collect();
        assert_eq!(client.replace_all(&entries).unwrap(), 3);

        let ids: Vec<_> = client
            .list_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["e0", "e1", "e2"]);
    }

    #[test]
    fn replace_all_rolls_back_on_conflict() {
        let client = client();
        client
            .insert_entry(&HistoryEntry::new("GET", "https://keep").with_id("keep"))
            .unwrap();

        let dup = HistoryEntry::new("GET", "https://dup").with_id("dup");
        assert!(client.replace_all(&[dup.clone(), dup]).is_err());

        let history = client.list_entries().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "keep");
    }

    #[test]
    fn toggle_update_and_missing_ids() {
        let client = client();
        let saved = client.insert_entry(&HistoryEntry::new("GET", "https://a")).unwrap();

        assert!(client.toggle_star(&saved.id).unwrap().starred);
        assert!(!client.toggle_star(&saved.id).unwrap().starred);

        let update = HistoryEntryUpdate {
            response_status: Some(404),
            ..Default::default()
        };
        assert_eq!(
            client.update_entry(&saved.id, &update).unwrap().response_status,
            Some(404)
        );

        assert!(client.toggle_star("nope").unwrap_err().is_not_found());
        assert!(client.delete_entry("nope").unwrap_err().is_not_found());
        assert!(client.update_entry("nope", &update).unwrap_err().is_not_found());
    }
}
