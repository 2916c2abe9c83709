//! 수집 파이프라인 (파일 단위)
//!
//! 로드 → 청킹 → ID/메타데이터 생성 → 일괄 임베딩 → 업서트.
//! 각 단계의 예상된 실패는 에러가 아니라 `IngestOutcome`으로 보고되므로
//! 배치 수집에서 한 파일의 실패가 나머지 파일을 멈추지 않습니다.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::{IngestConfig, ReingestPolicy};
use crate::embedding::{check_batch, EmbeddingProvider};
use crate::loader::load_document;

use super::chunker::Chunker;
use super::vector::{ChunkMetadata, Include, MetadataFilter, VectorStore, EMBEDDING_TYPE};

// ============================================================================
// Outcome Types
// ============================================================================

/// 파일 하나의 수집 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// 저장 성공
    Stored {
        chunks: usize,
        /// `replace` 정책으로 지운 이전 레코드 수
        replaced: usize,
    },
    /// 문서를 하나도 만들지 못함
    Unloadable { reason: String },
    /// 청크가 하나도 나오지 않음
    Unsplittable,
    /// 임베딩 실패
    EmbeddingFailed { reason: String },
    /// 벡터 저장소 쓰기 실패
    StoreFailed { reason: String },
}

impl IngestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }

    /// 기록용 상태 코드
    pub fn code(&self) -> &'static str {
        match self {
            Self::Stored { .. } => "stored",
            Self::Unloadable { .. } => "unloadable",
            Self::Unsplittable => "unsplittable",
            Self::EmbeddingFailed { .. } => "embedding_failed",
            Self::StoreFailed { .. } => "store_failed",
        }
    }
}

/// 수집 보고
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub file_name: String,
    pub file_type: String,
    pub file_path: String,
    pub outcome: IngestOutcome,
    /// 결과는 성공이지만 사용자에게 알려야 하는 문제
    pub warnings: Vec<String>,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn chunk_count(&self) -> usize {
        match self.outcome {
            IngestOutcome::Stored { chunks, .. } => chunks,
            _ => 0,
        }
    }

    /// 사용자 메시지
    pub fn message(&self) -> String {
        match &self.outcome {
            IngestOutcome::Stored { chunks, replaced: 0 } => {
                format!("'{}': {}개 청크 저장 완료", self.file_name, chunks)
            }
            IngestOutcome::Stored { chunks, replaced } => format!(
                "'{}': {}개 청크 저장 완료 (이전 레코드 {}개 교체)",
                self.file_name, chunks, replaced
            ),
            IngestOutcome::Unloadable { reason } => {
                format!("'{}': 파일을 읽을 수 없습니다 ({})", self.file_name, reason)
            }
            IngestOutcome::Unsplittable => {
                format!("'{}': 텍스트를 청크로 나눌 수 없습니다", self.file_name)
            }
            IngestOutcome::EmbeddingFailed { reason } => {
                format!("'{}': 임베딩 생성 실패 ({})", self.file_name, reason)
            }
            IngestOutcome::StoreFailed { reason } => {
                format!("'{}': 벡터 저장 실패 ({})", self.file_name, reason)
            }
        }
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

// ============================================================================
// IngestPipeline
// ============================================================================

/// 파일 수집 파이프라인
pub struct IngestPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Box<dyn Chunker>,
    options: IngestConfig,
}

impl IngestPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chunker: Box<dyn Chunker>,
        options: IngestConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            chunker,
            options,
        }
    }

    /// 파일 하나 수집
    ///
    /// # Arguments
    /// * `path` - 저장된 파일 경로 (메타데이터 file_path)
    /// * `declared_type` - 확장자 또는 MIME 타입 (메타데이터 file_type)
    pub async fn ingest_file(&self, path: &Path, declared_type: &str) -> IngestReport {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file_path = path.display().to_string();

        let mut report = IngestReport {
            file_name,
            file_type: declared_type.to_string(),
            file_path,
            outcome: IngestOutcome::Unsplittable,
            warnings: Vec::new(),
        };

        let outcome = self.run(&mut report, path).await;
        report.outcome = outcome;

        if report.is_success() {
            tracing::info!("{}", report.message());
        } else {
            tracing::warn!("{}", report.message());
        }
        report
    }

    async fn run(&self, report: &mut IngestReport, path: &Path) -> IngestOutcome {
        // 1. 로드
        let documents =
            match load_document(path, &report.file_type, self.options.prefer_table_excel).await {
                Ok(documents) => documents,
                Err(e) => {
                    return IngestOutcome::Unloadable {
                        reason: e.to_string(),
                    }
                }
            };

        // 2. 청킹 (파일 전체에 걸쳐 연속 번호)
        let chunks: Vec<String> = documents
            .iter()
            .flat_map(|doc| self.chunker.chunk(&doc.text))
            .collect();
        if chunks.is_empty() {
            return IngestOutcome::Unsplittable;
        }
        tracing::debug!(
            "Split {} into {} chunks ({} documents)",
            report.file_name,
            chunks.len(),
            documents.len()
        );

        // 3. ID + 메타데이터
        let total = chunks.len() as u32;
        let ids: Vec<String> = (0..chunks.len())
            .map(|i| chunk_id(&report.file_name, i))
            .collect();
        let metadatas: Vec<ChunkMetadata> = (0..total)
            .map(|i| ChunkMetadata {
                file_name: report.file_name.clone(),
                file_type: report.file_type.clone(),
                file_path: report.file_path.clone(),
                chunk_index: i,
                total_chunks: total,
                embedding_type: EMBEDDING_TYPE.to_string(),
            })
            .collect();

        // 4. 일괄 임베딩
        let vectors = match self.embedder.embed_batch(&chunks).await {
            Ok(vectors) => vectors,
            Err(e) => {
                return IngestOutcome::EmbeddingFailed {
                    reason: e.to_string(),
                }
            }
        };
        if let Err(e) = check_batch(&vectors, chunks.len(), self.embedder.dimension()) {
            return IngestOutcome::EmbeddingFailed {
                reason: e.to_string(),
            };
        }

        // 교체 대상은 새 레코드를 쓰기 전에 확정
        let previous = match self.options.reingest {
            ReingestPolicy::Append => Vec::new(),
            ReingestPolicy::Replace => match self.existing_ids(&report.file_name).await {
                Ok(ids) => ids,
                Err(reason) => return IngestOutcome::StoreFailed { reason },
            },
        };

        // 5. 업서트
        let count = match self.store.upsert_columns(ids, chunks, vectors, metadatas).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!("Vector store write failed for {}: {}", report.file_name, e);
                return IngestOutcome::StoreFailed {
                    reason: e.to_string(),
                };
            }
        };

        let mut replaced = 0;
        if !previous.is_empty() {
            match self.store.delete(&previous).await {
                Ok(n) => replaced = n,
                Err(e) => {
                    tracing::error!(
                        "Failed to remove previous records of {}: {}",
                        report.file_name,
                        e
                    );
                    report.warnings.push(format!(
                        "이전 레코드 {}개를 삭제하지 못했습니다: {}",
                        previous.len(),
                        e
                    ));
                }
            }
        }

        IngestOutcome::Stored {
            chunks: count,
            replaced,
        }
    }

    async fn existing_ids(&self, file_name: &str) -> Result<Vec<String>, String> {
        let filter = MetadataFilter::file_name(file_name).map_err(|e| e.to_string())?;
        self.store
            .get_all(Include::IDS, Some(&filter))
            .await
            .map(|snapshot| snapshot.ids)
            .map_err(|e| e.to_string())
    }
}

/// 청크 ID: `kb_{file_name}_{chunk_index}_{uuid 앞 8자리}`
pub fn chunk_id(file_name: &str, chunk_index: usize) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("kb_{}_{}_{}", file_name, chunk_index, &suffix[..8])
}

// ============================================================================
// Tests
// ============================================================================
