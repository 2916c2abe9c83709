//! KnowledgeBase - 지식 베이스 파사드
//!
//! 임베딩 엔진, 벡터 저장소, 파일 저장소, 업로드 기록을 한 번만 만들어
//! 수집/검색/삭제 서비스에 주입합니다. CLI는 이 타입만 사용합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::KbConfig;
use crate::embedding::{EmbeddingProvider, FastEmbedProvider};
use crate::error::{KbError, Result};
use crate::loader::FileKind;
use crate::report::{percent, MessageLevel, Reporter};
use crate::storage::{FileStore, StoredFile};

use super::chunker::recursive_chunker;
use super::delete::{BatchDeleteReport, DeleteReport, DeletionService};
use super::ingest::{IngestOutcome, IngestPipeline, IngestReport};
use super::lance::LanceVectorStore;
use super::retrieve::{RetrievalService, SearchResult};
use super::store::{NewUpload, UploadEntry, UploadLog, UploadStatus};
use super::vector::{ChunkRecord, Include, MetadataFilter, VectorStore, EMBEDDING_TYPE};

/// 미리보기 길이 (문자 수)
const PREVIEW_CHARS: usize = 150;

/// `inspect`에 포함할 샘플 레코드 수
const SAMPLE_RECORDS: usize = 3;

// ============================================================================
// Types
// ============================================================================

/// 업로드 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub path: PathBuf,
    /// 확장자 또는 MIME 타입
    pub declared_type: String,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>, declared_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            declared_type: declared_type.into(),
        }
    }

    /// 확장자로 타입 결정
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let declared_type = FileKind::from_path(&path).tag().to_string();
        Self {
            path,
            declared_type,
        }
    }
}

/// 파일별 통계
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub file_name: String,
    pub file_type: String,
    pub file_path: String,
    /// 수집 당시 기록된 청크 수
    pub total_chunks: u32,
    /// 현재 저장소에 있는 레코드 수
    pub chunk_count: usize,
}

/// 전체 초기화 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub records_deleted: usize,
    pub files_deleted: usize,
    pub history_cleared: usize,
    pub errors: Vec<String>,
}

impl ClearReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// 레코드 미리보기
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPreview {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub preview: String,
    pub dimension: usize,
}

/// 컬렉션 요약
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSummary {
    pub total_records: usize,
    /// embedding_type == "knowledge_base" 인 레코드 수
    pub knowledge_base_records: usize,
    pub samples: Vec<RecordPreview>,
}

/// 저장 파일 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSummary {
    pub files: Vec<StoredFile>,
    pub total_size: u64,
}

// ============================================================================
// KnowledgeBase
// ============================================================================

/// 지식 베이스
pub struct KnowledgeBase {
    config: KbConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    files: FileStore,
    uploads: UploadLog,
    pipeline: IngestPipeline,
    retrieval: RetrievalService,
    deletion: DeletionService,
}

impl KnowledgeBase {
    /// 설정대로 모든 구성 요소를 열어 생성
    ///
    /// 임베딩 모델 로드나 벡터 저장소 연결 실패는 여기서 바로 에러가 됩니다.
    pub async fn open(config: KbConfig) -> Result<Self> {
        config.chunking.validate()?;
        config.search.validate()?;

        let embedder = FastEmbedProvider::load(&config.embedding).await?;
        tracing::info!(
            "Embedding model ready: {} (dim={})",
            embedder.name(),
            embedder.dimension()
        );

        let store = LanceVectorStore::open(
            &config.index_dir(),
            &config.collection,
            embedder.dimension(),
        )
        .await?;

        let files = FileStore::open(config.files_dir())?;
        let uploads = UploadLog::open(&config.log_path()).map_err(upload_log_error)?;

        Self::with_components(config, Arc::new(embedder), Arc::new(store), files, uploads)
    }

    /// 구성 요소를 직접 주입해 생성
    pub fn with_components(
        config: KbConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        files: FileStore,
        uploads: UploadLog,
    ) -> Result<Self> {
        let chunker = recursive_chunker(config.chunking)?;

        let pipeline = IngestPipeline::new(
            embedder.clone(),
            store.clone(),
            chunker,
            config.ingest.clone(),
        );
        let retrieval =
            RetrievalService::new(embedder.clone(), store.clone(), config.search.max_top_k);
        let deletion = DeletionService::new(store.clone(), files.clone());

        Ok(Self {
            config,
            embedder,
            store,
            files,
            uploads,
            pipeline,
            retrieval,
            deletion,
        })
    }

    pub fn config(&self) -> &KbConfig {
        &self.config
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// 파일 하나 수집 (경로 그대로 사용) 후 업로드 기록
    pub async fn ingest_file(&self, path: &Path, declared_type: &str) -> IngestReport {
        let report = self.pipeline.ingest_file(path, declared_type).await;
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        self.record_upload(&report, size);
        report
    }

    /// 여러 파일 수집
    ///
    /// 각 파일을 저장 디렉토리에 복사(같은 이름은 덮어씀)한 뒤 수집합니다.
    /// 한 파일이 실패해도 나머지를 계속 처리합니다.
    pub async fn ingest_batch(
        &self,
        requests: &[UploadRequest],
        reporter: &dyn Reporter,
    ) -> Vec<IngestReport> {
        let mut reports = Vec::with_capacity(requests.len());

        for (i, request) in requests.iter().enumerate() {
            reporter.message(
                MessageLevel::Info,
                &format!("처리 중: {}", request.path.display()),
            );

            let report = match self.files.save(&request.path) {
                Ok(stored) => self.ingest_file(&stored, &request.declared_type).await,
                Err(e) => {
                    tracing::warn!("Failed to store {:?}: {}", request.path, e);
                    let report = unstored_report(request, &e);
                    self.record_upload(&report, 0);
                    report
                }
            };

            if report.is_success() {
                reporter.message(MessageLevel::Success, &report.message());
            } else {
                reporter.message(MessageLevel::Error, &report.message());
            }
            for warning in &report.warnings {
                reporter.message(MessageLevel::Warning, warning);
            }
            reporter.progress(percent(i + 1, requests.len()));

            reports.push(report);
        }

        let stored = reports.iter().filter(|r| r.is_success()).count();
        tracing::info!("Batch ingest finished: {}/{} files stored", stored, reports.len());
        reports
    }

    fn record_upload(&self, report: &IngestReport, size_bytes: u64) {
        let entry = NewUpload {
            file_name: report.file_name.clone(),
            file_path: report.file_path.clone(),
            file_type: report.file_type.clone(),
            size_bytes,
            status: if report.is_success() {
                UploadStatus::Stored
            } else {
                UploadStatus::Failed
            },
            chunk_count: report.chunk_count(),
            message: report.message(),
        };

        if let Err(e) = self.uploads.record(&entry) {
            tracing::warn!("Failed to record upload of {}: {:#}", report.file_name, e);
        }
    }

    // ========================================================================
    // Search / Delete
    // ========================================================================

    /// 유사도 검색
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        file_filter: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        self.retrieval.search(query, top_k, file_filter).await
    }

    /// 파일과 벡터 레코드 삭제
    pub async fn delete_file(&self, file_name: &str) -> Result<DeleteReport> {
        self.deletion.delete_file(file_name).await
    }

    /// 여러 파일 삭제
    pub async fn delete_files(
        &self,
        file_names: &[String],
        reporter: &dyn Reporter,
    ) -> BatchDeleteReport {
        self.deletion.delete_files(file_names, reporter).await
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// 파일별 청크 통계 (파일 이름순)
    pub async fn get_statistics(&self) -> Result<BTreeMap<String, FileStats>> {
        let snapshot = self.store.get_all(Include::METADATAS, None).await?;

        let mut stats: BTreeMap<String, FileStats> = BTreeMap::new();
        for metadata in snapshot.metadatas {
            stats
                .entry(metadata.file_name.clone())
                .and_modify(|s| s.chunk_count += 1)
                .or_insert_with(|| FileStats {
                    file_name: metadata.file_name,
                    file_type: metadata.file_type,
                    file_path: metadata.file_path,
                    total_chunks: metadata.total_chunks,
                    chunk_count: 1,
                });
        }

        Ok(stats)
    }

    /// 한 파일의 모든 레코드
    pub async fn records_for_file(&self, file_name: &str) -> Result<Vec<ChunkRecord>> {
        let filter = MetadataFilter::file_name(file_name)?;
        let snapshot = self.store.get_all(Include::ALL, Some(&filter)).await?;
        Ok(ChunkRecord::zip(
            snapshot.ids,
            snapshot.texts,
            snapshot.vectors,
            snapshot.metadatas,
        )?)
    }

    /// 저장소에 있는 파일 이름 (정렬, 중복 제거)
    pub async fn file_names(&self) -> Result<Vec<String>> {
        let snapshot = self.store.get_all(Include::METADATAS, None).await?;
        let names: BTreeSet<String> = snapshot
            .metadatas
            .into_iter()
            .map(|m| m.file_name)
            .collect();
        Ok(names.into_iter().collect())
    }

    /// 컬렉션 요약
    pub async fn inspect(&self) -> Result<CollectionSummary> {
        let snapshot = self.store.get_all(Include::ALL, None).await?;

        let knowledge_base_records = snapshot
            .metadatas
            .iter()
            .filter(|m| m.embedding_type == EMBEDDING_TYPE)
            .count();

        let samples = snapshot
            .ids
            .iter()
            .zip(&snapshot.texts)
            .zip(&snapshot.metadatas)
            .zip(&snapshot.vectors)
            .take(SAMPLE_RECORDS)
            .map(|(((id, text), metadata), vector)| RecordPreview {
                id: id.clone(),
                file_name: metadata.file_name.clone(),
                file_path: metadata.file_path.clone(),
                preview: preview(text),
                dimension: vector.len(),
            })
            .collect();

        Ok(CollectionSummary {
            total_records: snapshot.ids.len(),
            knowledge_base_records,
            samples,
        })
    }

    /// 저장 디렉토리의 파일 목록과 전체 크기
    pub fn stored_files(&self) -> Result<StorageSummary> {
        let files = self.files.list()?;
        let total_size = files.iter().map(|f| f.size).sum();
        Ok(StorageSummary { files, total_size })
    }

    /// 최근 업로드 기록 (최신순)
    pub fn history(&self, limit: usize) -> Result<Vec<UploadEntry>> {
        self.uploads.recent(limit).map_err(upload_log_error)
    }

    // ========================================================================
    // Clear
    // ========================================================================

    /// 모든 레코드, 저장 파일, 업로드 기록 삭제
    ///
    /// 한 단계가 실패해도 나머지 단계를 진행하고 실패 내용을 `errors`에 모읍니다.
    pub async fn clear_all(&self) -> ClearReport {
        let mut report = ClearReport::default();

        match self.store.get_all(Include::IDS, None).await {
            Ok(snapshot) if snapshot.is_empty() => {}
            Ok(snapshot) => match self.store.delete(&snapshot.ids).await {
                Ok(n) => report.records_deleted = n,
                Err(e) => report.errors.push(format!("벡터 레코드 삭제 실패: {}", e)),
            },
            Err(e) => report.errors.push(format!("벡터 레코드 조회 실패: {}", e)),
        }

        match self.files.clear() {
            Ok(n) => report.files_deleted = n,
            Err(e) => report.errors.push(format!("파일 삭제 실패: {}", e)),
        }

        match self.uploads.clear() {
            Ok(n) => report.history_cleared = n,
            Err(e) => report.errors.push(format!("업로드 기록 삭제 실패: {:#}", e)),
        }

        if report.is_success() {
            tracing::info!(
                "Cleared knowledge base: {} records, {} files",
                report.records_deleted,
                report.files_deleted
            );
        } else {
            tracing::error!("Clear finished with errors: {:?}", report.errors);
        }
        report
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn upload_log_error(e: anyhow::Error) -> KbError {
    KbError::UploadLog(format!("{:#}", e))
}

/// 저장 단계에서 실패한 업로드의 보고
fn unstored_report(request: &UploadRequest, error: &KbError) -> IngestReport {
    let file_name = request
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.path.display().to_string());

    IngestReport {
        file_name,
        file_type: request.declared_type.clone(),
        file_path: request.path.display().to_string(),
        outcome: IngestOutcome::Unloadable {
            reason: error.to_string(),
        },
        warnings: Vec::new(),
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", truncated)
}

// ============================================================================
// Tests
// ============================================================================
