//! 키-값 저장소 포트.
//!
//! 플랫폼 키-값 프리미티브(브라우저형 타깃)와 재시작 후에도 유지되는
//! 환경설정 저장소가 같은 계약을 사용한다.
//!
//! 구현: `apiary-storage` crate (`FileKeyValueStore`, `MemoryKeyValueStore`)

use async_trait::async_trait;

use crate::error::CoreError;

/// 문자열 키-값 저장소
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 값 조회 (없으면 `None`)
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError>;

    /// 값 저장 (덮어쓰기)
    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;

    /// 값 삭제: 존재했으면 `true`
    async fn remove(&self, key: &str) -> Result<bool, CoreError>;

    /// 접두사로 시작하는 키 목록 (정렬됨)
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, CoreError>;
}
