//! # apiary-storage
//!
//! 히스토리 저장소 어댑터.
//! 단일 JSON 문서 저장소와 관계형 저장소 어댑터가 같은 `HistoryStorage` 계약을 구현하고,
//! 백업 스냅샷을 순환 보관한다.
//!
//! ## 모듈
//! - `json_storage`: JSON 문서 어댑터 (키-값 또는 파일)
//! - `database_storage`: 데이터베이스 어댑터 (`HistoryApiClient` 위에서 동작)
//! - `document`: 단일 문서 읽기/쓰기 프리미티브
//! - `backup`: 백업 스냅샷 순환 보관
//! - `kv_store`: 파일/인메모리 키-값 저장소
//! - `sqlite`: 임베디드 SQLite 히스토리 저장소
//! - `migration`: 스키마 마이그레이션

pub mod backup;
pub mod database_storage;
pub mod document;
pub mod json_storage;
pub mod kv_store;
pub mod migration;
pub mod sqlite;
