//! 문서 저장소: JSON 어댑터가 쓰는 단일 문서 읽기/쓰기 프리미티브.
//!
//! 플랫폼 키-값 저장소 또는 디렉토리 내 파일 중 하나로 동작한다.
//! 파일 모드에서 키 `k`는 `<dir>/k.json` 파일에 대응한다.

use apiary_core::error::CoreError;
use apiary_core::ports::kv_store::KeyValueStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// 파일 모드 문서 확장자
const DOCUMENT_EXTENSION: &str = "json";

/// 단일 문서 저장소
#[derive(Clone)]
pub enum DocumentStore {
    /// 플랫폼 키-값 프리미티브
    KeyValue(Arc<dyn KeyValueStore>),
    /// 디렉토리 내 JSON 파일
    File {
        /// 문서 디렉토리
        dir: PathBuf,
    },
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStore::KeyValue(_) => f.write_str("DocumentStore::KeyValue"),
            DocumentStore::File { dir } => write!(f, "DocumentStore::File({})", dir.display()),
        }
    }
}

impl DocumentStore {
    /// 파일 모드 저장소
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        DocumentStore::File { dir: dir.into() }
    }

    /// 키-값 모드 저장소
    pub fn key_value(store: Arc<dyn KeyValueStore>) -> Self {
        DocumentStore::KeyValue(store)
    }

    /// 사람이 읽을 수 있는 위치 설명 (로그용)
    pub fn describe(&self) -> String {
        match self {
            DocumentStore::KeyValue(_) => "key-value".to_string(),
            DocumentStore::File { dir } => dir.display().to_string(),
        }
    }

    /// 쓰기 가능 상태 준비 (파일 모드: 디렉토리 생성)
    pub async fn ensure_ready(&self) -> Result<(), CoreError> {
        match self {
            DocumentStore::KeyValue(store) => {
                // 접근 가능 여부만 확인
                store.get("__probe__").await.map(|_| ())
            }
            DocumentStore::File { dir } => fs::create_dir_all(dir).await.map_err(|e| {
                CoreError::Internal(format!("문서 디렉토리 생성 실패: {}: {e}", dir.display()))
            }),
        }
    }

    /// 문서 읽기 (없으면 `None`)
    pub async fn read(&self, key: &str) -> Result<Option<String>, CoreError> {
        match self {
            DocumentStore::KeyValue(store) => store.get(key).await,
            DocumentStore::File { dir } => {
                let path = document_path(dir, key);
                match fs::read_to_string(&path).await {
                    Ok(content) => Ok(Some(content)),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(CoreError::Internal(format!(
                        "문서 읽기 실패: {}: {e}",
                        path.display()
                    ))),
                }
            }
        }
    }

    /// 문서 전체 쓰기 (한 번의 교체)
    pub async fn write(&self, key: &str, content: &str) -> Result<(), CoreError> {
        match self {
            DocumentStore::KeyValue(store) => store.set(key, content).await,
            DocumentStore::File { dir } => {
                fs::create_dir_all(dir).await.map_err(|e| {
                    CoreError::Internal(format!(
                        "문서 디렉토리 생성 실패: {}: {e}",
                        dir.display()
                    ))
                })?;
                write_atomic(&document_path(dir, key), content).await
            }
        }
    }

    /// 문서 삭제: 존재했으면 `true`
    pub async fn remove(&self, key: &str) -> Result<bool, CoreError> {
        match self {
            DocumentStore::KeyValue(store) => store.remove(key).await,
            DocumentStore::File { dir } => {
                let path = document_path(dir, key);
                match fs::remove_file(&path).await {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                    Err(e) => Err(CoreError::Internal(format!(
                        "문서 삭제 실패: {}: {e}",
                        path.display()
                    ))),
                }
            }
        }
    }

    /// 접두사로 시작하는 문서 키 목록 (정렬됨)
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, CoreError> {
        match self {
            DocumentStore::KeyValue(store) => store.keys(prefix).await,
            DocumentStore::File { dir } => {
                let mut entries = match fs::read_dir(dir).await {
                    Ok(entries) => entries,
                    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                    Err(e) => {
                        return Err(CoreError::Internal(format!(
                            "문서 디렉토리 조회 실패: {}: {e}",
                            dir.display()
                        )))
                    }
                };

                let mut keys = Vec::new();
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| CoreError::Internal(format!("디렉토리 항목 조회 실패: {e}")))?
                {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        if stem.starts_with(prefix) {
                            keys.push(stem.to_string());
                        }
                    }
                }
                keys.sort();
                Ok(keys)
            }
        }
    }
}

fn document_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.{DOCUMENT_EXTENSION}"))
}

/// 임시 파일에 쓴 뒤 rename으로 교체
pub(crate) async fn write_atomic(path: &Path, content: &str) -> Result<(), CoreError> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content).await.map_err(|e| {
        CoreError::Internal(format!("임시 파일 쓰기 실패: {}: {e}", tmp_path.display()))
    })?;
    fs::rename(&tmp_path, path).await.map_err(|e| {
        CoreError::Internal(format!("파일 교체 실패: {}: {e}", path.display()))
    })?;
    debug!("문서 저장: {} ({} bytes)", path.display(), content.len());
    Ok(())
}
