//! 키-값 저장소 구현.
//!
//! - `FileKeyValueStore`: 단일 JSON 객체 파일 (재시작 후에도 유지되는 환경설정 저장소)
//! - `MemoryKeyValueStore`: 프로세스 메모리 (테스트, 파일 시스템 없는 환경)

use apiary_core::error::CoreError;
use apiary_core::ports::kv_store::KeyValueStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::document::write_atomic;

/// 파일 기반 키-값 저장소
///
/// 모든 키를 하나의 JSON 객체 파일에 저장한다.
/// 파일이 없거나 손상되었으면 빈 저장소로 취급한다.
pub struct FileKeyValueStore {
    path: PathBuf,
    /// 읽기-수정-쓰기 직렬화
    write_lock: Mutex<()>,
}

impl FileKeyValueStore {
    /// 새 저장소 생성 (파일은 첫 쓰기 시 생성)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// 저장 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, CoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(CoreError::Internal(format!(
                    "환경설정 파일 읽기 실패: {}: {e}",
                    self.path.display()
                )))
            }
        };

        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(
                    "환경설정 파일 손상, 빈 저장소로 취급: {}: {e}",
                    self.path.display()
                );
                Ok(BTreeMap::new())
            }
        }
    }

    async fn save(&self, map: &BTreeMap<String, String>) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                CoreError::Internal(format!(
                    "환경설정 디렉토리 생성 실패: {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let content = serde_json::to_string_pretty(map)?;
        write_atomic(&self.path, &content).await
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), value.to_string());
        self.save(&map).await?;
        debug!("환경설정 저장: {key}");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.save(&map).await?;
        Ok(true)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, CoreError> {
        Ok(self
            .load()
            .await?
            .into_keys()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}

/// 인메모리 키-값 저장소
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    map: RwLock<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.map.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.map.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CoreError> {
        Ok(self.map.write().remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, CoreError> {
        Ok(self
            .map
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
