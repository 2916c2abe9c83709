//! CLI 모듈
//!
//! kbase CLI 명령어 정의 및 구현

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::KbConfig;
use crate::knowledge::{KnowledgeBase, UploadLog, UploadRequest};
use crate::report::{ConsoleReporter, MessageLevel};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "kbase")]
#[command(version, about = "로컬 문서 지식 베이스", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 모든 명령에 공통인 옵션
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// 데이터 디렉토리 (기본: ~/.kbase)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 설정 파일 경로 (기본: <data_dir>/kbase.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 임베딩 모델 이름
    #[arg(long, global = true)]
    pub model: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 파일을 지식 베이스에 추가
    Ingest {
        /// 수집할 파일 경로
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// 파일 타입 (확장자 또는 MIME, 없으면 확장자로 결정)
        #[arg(short = 't', long = "type")]
        file_type: Option<String>,
    },

    /// 유사도 검색
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 (1 ~ max_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 파일 이름 필터
        #[arg(short, long)]
        file: Option<String>,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 파일과 벡터 레코드 삭제
    Delete {
        /// 삭제할 파일 이름
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// 파일별 청크 통계
    Stats,

    /// 벡터 컬렉션 요약
    Inspect,

    /// 저장된 파일 목록
    Files {
        /// 벡터 저장소에 색인된 파일 이름 (검색 필터용)
        #[arg(long)]
        indexed: bool,
    },

    /// 업로드 기록
    History {
        /// 표시할 개수
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// 모든 레코드, 파일, 기록 삭제
    Clear {
        /// 확인 없이 삭제
        #[arg(short, long)]
        yes: bool,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.global)?;

    match cli.command {
        Commands::Ingest { files, file_type } => cmd_ingest(config, files, file_type).await,
        Commands::Query {
            query,
            top_k,
            file,
            json,
        } => cmd_query(config, &query, top_k, file.as_deref(), json).await,
        Commands::Delete { names } => cmd_delete(config, &names).await,
        Commands::Stats => cmd_stats(config).await,
        Commands::Inspect => cmd_inspect(config).await,
        Commands::Files { indexed } => cmd_files(config, indexed).await,
        Commands::History { limit } => cmd_history(&config, limit),
        Commands::Clear { yes } => cmd_clear(config, yes).await,
    }
}

/// 설정 로드 후 CLI 플래그 적용
fn load_config(global: &GlobalArgs) -> Result<KbConfig> {
    let mut config = KbConfig::load(global.data_dir.as_deref(), global.config.as_deref())
        .context("설정 로드 실패")?;

    if let Some(ref model) = global.model {
        config.embedding.model = model.clone();
    }

    tracing::debug!("Data directory: {:?}", config.data_dir);
    Ok(config)
}

async fn open_knowledge_base(config: KbConfig) -> Result<KnowledgeBase> {
    tracing::info!("Loading embedding model: {}", config.embedding.model);
    let kb = KnowledgeBase::open(config)
        .await
        .context("지식 베이스 초기화 실패")?;
    tracing::info!(
        "Embedding model ready: {} (dimension={})",
        kb.embedder().name(),
        kb.embedder().dimension()
    );
    Ok(kb)
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 수집 명령어 (ingest)
async fn cmd_ingest(
    config: KbConfig,
    files: Vec<PathBuf>,
    file_type: Option<String>,
) -> Result<()> {
    let kb = open_knowledge_base(config).await?;

    let requests: Vec<UploadRequest> = files
        .into_iter()
        .map(|path| match file_type {
            Some(ref t) => UploadRequest::new(path, t.clone()),
            None => UploadRequest::from_path(path),
        })
        .collect();

    println!("[*] 수집 대상: {} 파일", requests.len());
    println!();

    let reports = kb.ingest_batch(&requests, &ConsoleReporter).await;

    let success_count = reports.iter().filter(|r| r.is_success()).count();
    let failed_count = reports.len() - success_count;
    let chunk_count: usize = reports.iter().map(|r| r.chunk_count()).sum();

    println!();
    println!(
        "[OK] 완료: 성공 {}, 실패 {} (청크 {}개)",
        success_count, failed_count, chunk_count
    );

    check_ingest_result(success_count, failed_count)
}

/// 하나도 저장하지 못했으면 실패
fn check_ingest_result(succeeded: usize, failed: usize) -> Result<()> {
    if succeeded == 0 && failed > 0 {
        bail!("{}개 파일 모두 수집에 실패했습니다", failed);
    }
    Ok(())
}

/// 검색 명령어 (query)
async fn cmd_query(
    config: KbConfig,
    query: &str,
    top_k: Option<usize>,
    file: Option<&str>,
    json: bool,
) -> Result<()> {
    let top_k = top_k.unwrap_or(config.search.default_top_k);
    let kb = open_knowledge_base(config).await?;

    if json {
        let results = kb.search(query, top_k, file).await.context("검색 실패")?;
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    match file {
        Some(name) => println!("[*] 검색 중: \"{}\" (파일: {})", query, name),
        None => println!("[*] 검색 중: \"{}\"", query),
    }

    let results = kb.search(query, top_k, file).await.context("검색 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [유사도: {:.3}] {} ({}, 청크 {}/{})",
            i + 1,
            result.similarity,
            result.source_file,
            result.file_type,
            result.chunk_index + 1,
            result.total_chunks
        );
        println!("   내용: {}", truncate_text(&result.content, 200));
        println!();
    }

    Ok(())
}

/// 삭제 명령어 (delete)
async fn cmd_delete(config: KbConfig, names: &[String]) -> Result<()> {
    let kb = open_knowledge_base(config).await?;

    let batch = kb.delete_files(names, &ConsoleReporter).await;

    println!();
    println!(
        "[OK] 삭제 완료: 파일 {}개, 벡터 레코드 {}개",
        batch.files_deleted, batch.vector_records_deleted
    );

    let failures = batch.failures();
    if failures > 0 {
        bail!("{}개 파일 삭제에 실패했습니다", failures);
    }
    Ok(())
}

/// 통계 명령어 (stats)
async fn cmd_stats(config: KbConfig) -> Result<()> {
    let kb = open_knowledge_base(config).await?;
    let stats = kb.get_statistics().await.context("통계 조회 실패")?;

    if stats.is_empty() {
        println!("[!] 저장된 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 파일 ({} 건):\n", stats.len());

    for file in stats.values() {
        println!("  {} [{}]", file.file_name, file.file_type);
        println!("        경로: {}", file.file_path);
        println!(
            "        청크: {} (수집 시 {})",
            file.chunk_count, file.total_chunks
        );
        if file.chunk_count != file.total_chunks as usize {
            println!("        [!] 같은 이름으로 여러 번 수집되었거나 일부 레코드가 없습니다");
        }
    }

    let total: usize = stats.values().map(|s| s.chunk_count).sum();
    println!();
    println!("[*] 총 청크: {}", total);

    Ok(())
}

/// 컬렉션 요약 명령어 (inspect)
async fn cmd_inspect(config: KbConfig) -> Result<()> {
    let kb = open_knowledge_base(config).await?;
    let summary = kb.inspect().await.context("컬렉션 조회 실패")?;

    println!("[*] 컬렉션: {}", kb.config().collection);
    println!("[OK] 전체 레코드: {}", summary.total_records);
    println!("     지식 베이스 레코드: {}", summary.knowledge_base_records);

    if summary.samples.is_empty() {
        return Ok(());
    }

    println!("\n[*] 샘플 레코드:\n");
    for (i, sample) in summary.samples.iter().enumerate() {
        println!("{}. {}", i + 1, sample.id);
        println!("   파일: {} ({})", sample.file_name, sample.file_path);
        println!("   차원: {}", sample.dimension);
        println!("   내용: {}", truncate_text(&sample.preview, 150));
        println!();
    }

    Ok(())
}

/// 저장 파일 목록 명령어 (files)
async fn cmd_files(config: KbConfig, indexed: bool) -> Result<()> {
    let kb = open_knowledge_base(config).await?;

    if indexed {
        return print_indexed_files(&kb).await;
    }

    let summary = kb.stored_files().context("파일 목록 조회 실패")?;

    if summary.files.is_empty() {
        println!("[!] 저장된 파일이 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 파일 ({} 건):\n", summary.files.len());
    for file in &summary.files {
        println!("  {:<40} {:>12}", file.name, format_bytes(file.size as usize));
    }
    println!();
    println!("[*] 총 크기: {}", format_bytes(summary.total_size as usize));

    Ok(())
}

/// 색인된 파일 이름과 레코드 수 (query --file 에 쓰는 이름)
async fn print_indexed_files(kb: &KnowledgeBase) -> Result<()> {
    let names = kb.file_names().await.context("색인 파일 조회 실패")?;

    if names.is_empty() {
        println!("[!] 색인된 파일이 없습니다.");
        return Ok(());
    }

    println!("[OK] 색인된 파일 ({} 건):\n", names.len());
    for name in &names {
        let records = kb
            .records_for_file(name)
            .await
            .with_context(|| format!("{} 레코드 조회 실패", name))?;
        println!("  {:<40} 청크 {}", name, records.len());
    }

    Ok(())
}

/// 업로드 기록 명령어 (history)
fn cmd_history(config: &KbConfig, limit: usize) -> Result<()> {
    let log = UploadLog::open(&config.log_path()).context("업로드 기록 열기 실패")?;
    let entries = log.recent(limit).context("업로드 기록 조회 실패")?;

    if entries.is_empty() {
        println!("[!] 업로드 기록이 없습니다.");
        return Ok(());
    }

    println!("[OK] 최근 업로드 ({} 건):\n", entries.len());
    for entry in entries {
        println!(
            "  #{:<4} [{}] {} ({})",
            entry.id,
            entry.status.as_str(),
            entry.file_name,
            entry.file_type
        );
        println!(
            "        {} | {} | 청크 {}",
            entry.uploaded_at.format("%Y-%m-%d %H:%M"),
            format_bytes(entry.size_bytes as usize),
            entry.chunk_count
        );
        println!("        {}", entry.message);
    }

    Ok(())
}

/// 전체 삭제 명령어 (clear)
async fn cmd_clear(config: KbConfig, yes: bool) -> Result<()> {
    let prompt = "모든 벡터 레코드, 저장 파일, 업로드 기록을 삭제합니다. 계속할까요? (y/N) ";
    if !yes && !confirm(prompt)? {
        println!("[!] 취소되었습니다.");
        return Ok(());
    }

    let kb = open_knowledge_base(config).await?;
    let report = kb.clear_all().await;

    println!(
        "{} 벡터 레코드 {}개, 파일 {}개, 업로드 기록 {}개 삭제",
        MessageLevel::Success,
        report.records_deleted,
        report.files_deleted,
        report.history_cleared
    );

    if !report.is_success() {
        for error in &report.errors {
            eprintln!("{} {}", MessageLevel::Error, error);
        }
        bail!("초기화 중 {}개 단계가 실패했습니다", report.errors.len());
    }
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// y/N 확인
fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
