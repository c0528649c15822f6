//! # apiary
//!
//! 요청 히스토리 저장소 CLI.
//! 설정 로드, 어댑터 구성, 명령 실행.

use anyhow::{anyhow, Context, Result};
use apiary_app::context::AppContext;
use apiary_core::config::DatabaseMode;
use apiary_core::config_manager::ConfigManager;
use apiary_core::models::backup::ExportEnvelope;
use apiary_core::models::history::HistoryEntry;
use apiary_core::models::storage::StorageKind;
use apiary_core::ports::kv_store::KeyValueStore;
use apiary_storage::kv_store::FileKeyValueStore;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 환경설정 파일 이름
const PREFERENCES_FILE: &str = "preferences.json";

/// Apiary 요청 히스토리 저장소
#[derive(Parser, Debug)]
#[command(name = "apiary")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 히스토리 API 서버 URL (기본: http://localhost:3001/api)
    #[arg(long, short = 's')]
    server: Option<String>,

    /// 데이터 저장 경로 (기본: 플랫폼 데이터 디렉토리)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "warn")]
    log_level: String,

    /// 원격 서버 대신 임베디드 SQLite를 데이터베이스 백엔드로 사용
    #[arg(long)]
    embedded: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 활성 저장소와 통계 출력
    Status,
    /// 히스토리 목록 출력
    List {
        /// 즐겨찾기만
        #[arg(long)]
        starred: bool,
        /// 최대 출력 개수
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
    /// 히스토리 항목 추가
    Add {
        /// HTTP 메서드
        method: String,
        /// 요청 URL
        url: String,
        /// 요청 헤더 (`이름:값`, 여러 번 지정 가능)
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,
        /// 요청 본문
        #[arg(long)]
        body: Option<String>,
        /// 응답 상태 코드
        #[arg(long)]
        status: Option<u16>,
        /// 응답 지연 (밀리초)
        #[arg(long)]
        time_ms: Option<u64>,
    },
    /// 즐겨찾기 토글
    Star { id: String },
    /// 히스토리 항목 삭제
    Delete { id: String },
    /// 히스토리 전체 삭제
    Clear,
    /// 활성 저장소 전환 (json | database)
    Switch { kind: StorageKind },
    /// 저장소 간 마이그레이션 후 대상으로 전환
    Migrate { from: StorageKind, to: StorageKind },
    /// 히스토리를 내보내기 파일로 저장
    Export { file: PathBuf },
    /// 내보내기 파일로 히스토리 교체
    Import { file: PathBuf },
    /// 백업 생성
    Backup,
    /// 백업 목록
    Backups,
    /// 백업 복원
    Restore { id: String },
    /// 저장소 상태 점검
    Health,
    /// 설정 파일 조회/변경
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// 백엔드별 자동 백업 주기 설정 (시간, 0이면 끔)
    BackupInterval { kind: StorageKind, hours: u32 },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// 현재 설정 출력
    Show,
    /// 점 표기 키로 값 설정 (예: `storage.max_history_entries 200`)
    Set { key: String, value: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("헤더 형식 오류 (이름:값): {raw}"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "apiary={},apiary_app={},apiary_core={},apiary_storage={},apiary_network={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    info!("설정 파일: {}", config_manager.config_path().display());

    if let Command::Config { action } = &args.command {
        return run_config(&config_manager, action);
    }

    let mut config = config_manager.get();
    if let Some(server) = &args.server {
        config.server.base_url = server.clone();
    }
    if let Some(data_dir) = &args.data_dir {
        config.storage.data_dir = Some(data_dir.clone());
    }
    if args.embedded {
        config.storage.database_mode = DatabaseMode::Embedded;
    }

    let data_dir = match &config.storage.data_dir {
        Some(dir) => dir.clone(),
        None => ConfigManager::data_dir()?,
    };
    let preferences_dir = config_manager
        .config_path()
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.clone());
    let preferences: Arc<dyn KeyValueStore> =
        Arc::new(FileKeyValueStore::new(preferences_dir.join(PREFERENCES_FILE)));

    let ctx = AppContext::build(config, &data_dir, preferences)
        .await
        .context("저장소 구성 실패")?;

    // 점검과 설정 변경은 저장소 초기화 없이 실행
    if !matches!(args.command, Command::Health | Command::BackupInterval { .. }) {
        let kind = ctx.storage.initialize().await?;
        if let Some(reason) = ctx.config_store.snapshot().fallback_reason {
            warn!("{kind} 저장소로 폴백됨: {reason}");
        }
    }

    run(&ctx, args.command).await
}

fn run_config(config_manager: &ConfigManager, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => print_json(&config_manager.get()),
        ConfigAction::Set { key, value } => {
            config_manager.update_with(|config| config.set_value(key, value))?;
            println!("{key} = {value}");
            Ok(())
        }
    }
}

async fn run(ctx: &AppContext, command: Command) -> Result<()> {
    let history = &ctx.history;

    match command {
        Command::Status => {
            let stats = ctx.storage.get_storage_stats().await?;
            println!("활성 저장소: {}", ctx.storage.active_kind()?);
            print_json(&ctx.config_store.snapshot())?;
            print_json(&stats)?;
        }
        Command::List { starred, limit } => {
            let entries: Vec<HistoryEntry> = history
                .fetch_history()
                .await
                .into_iter()
                .filter(|e| !starred || e.starred)
                .take(limit.unwrap_or(usize::MAX))
                .collect();
            if let Some(error) = history.error() {
                return Err(anyhow!(error));
            }
            for entry in &entries {
                println!(
                    "{}  {}{:<7} {}  {}",
                    entry.id,
                    if entry.starred { "*" } else { " " },
                    entry.method,
                    entry.url,
                    entry
                        .response_status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
        }
        Command::Add {
            method,
            url,
            headers,
            body,
            status,
            time_ms,
        } => {
            let mut entry = HistoryEntry::new(method.to_ascii_uppercase(), url);
            for raw in &headers {
                let (name, value) = parse_header(raw)?;
                entry = entry.with_header(name, value);
            }
            if let Some(body) = body {
                entry = entry.with_body(body);
            }
            entry.response_status = status;
            entry.response_time_ms = time_ms;

            match history.add_history_entry(entry).await {
                Ok(Some(saved)) => println!("{}", saved.id),
                Ok(None) => warn!("추가 진행 중, 요청 무시"),
                Err(e) => {
                    return Err(anyhow!(history.error().unwrap_or_else(|| e.to_string())));
                }
            }
        }
        Command::Star { id } => {
            let entry = history.toggle_history_star(&id).await?;
            println!("{} starred={}", entry.id, entry.starred);
        }
        Command::Delete { id } => {
            history.delete_history_entry(&id).await?;
            println!("삭제: {id}");
        }
        Command::Clear => {
            history.clear_all_history().await?;
            println!("히스토리 전체 삭제");
        }
        Command::Switch { kind } => {
            history.switch_storage_type(kind).await?;
            println!("활성 저장소: {kind}");
        }
        Command::Migrate { from, to } => {
            let report = history.migrate_data(from, to).await?;
            for warning in &report.warnings {
                warn!("마이그레이션 경고: {warning}");
            }
            print_json(&report)?;
        }
        Command::Export { file } => {
            let envelope = history.export_history().await?;
            let content = serde_json::to_string_pretty(&envelope)?;
            tokio::fs::write(&file, content)
                .await
                .with_context(|| format!("내보내기 파일 쓰기 실패: {}", file.display()))?;
            println!("{} 항목 내보냄: {}", envelope.len(), file.display());
        }
        Command::Import { file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("가져오기 파일 읽기 실패: {}", file.display()))?;
            let envelope: ExportEnvelope =
                serde_json::from_str(&content).context("내보내기 형식 오류")?;
            let count = history.import_history(&envelope).await?;
            println!("{count} 항목 가져옴");
        }
        Command::Backup => {
            let info = history.create_backup().await?;
            print_json(&info)?;
        }
        Command::Backups => {
            for info in history.list_backups().await? {
                println!(
                    "{}  {}  {}  {} 항목",
                    info.id,
                    info.timestamp.to_rfc3339(),
                    info.source,
                    info.entry_count
                );
            }
        }
        Command::Restore { id } => {
            let count = history.restore_backup(&id).await?;
            println!("{count} 항목 복원: {id}");
        }
        Command::Health => {
            print_json(&ctx.storage.health_check().await)?;
        }
        Command::BackupInterval { kind, hours } => {
            ctx.config_store.set_backup_interval(kind, hours).await?;
            println!("{kind} 자동 백업 주기: {hours}시간");
        }
        Command::Config { .. } => {
            return Err(anyhow!("config 명령은 저장소 구성 전에 처리됩니다"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parsing() {
        assert_eq!(
            parse_header("Content-Type: application/json").unwrap(),
            ("Content-Type".to_string(), "application/json".to_string())
        );
        assert!(parse_header("no-colon").is_err());
    }

    #[test]
    fn cli_parses_migrate() {
        let args = Args::try_parse_from(["apiary", "--embedded", "migrate", "json", "db"]).unwrap();
        assert!(args.embedded);
        match args.command {
            Command::Migrate { from, to } => {
                assert_eq!(from, StorageKind::Json);
                assert_eq!(to, StorageKind::Database);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_config_set() {
        let args =
            Args::try_parse_from(["apiary", "config", "set", "storage.max_backups", "9"]).unwrap();
        match args.command {
            Command::Config {
                action: ConfigAction::Set { key, value },
            } => {
                assert_eq!(key, "storage.max_backups");
                assert_eq!(value, "9");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
