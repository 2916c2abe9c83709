//! 검색 서비스
//!
//! 질의 텍스트 → 임베딩 → 필터 적용 유사도 검색 → 결과 정리.
//! 유사도는 `1 - 코사인 거리`를 [0, 1]로 자르고 소수점 셋째 자리로 반올림합니다.

use std::sync::Arc;

use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::{KbError, ValidationError};

use super::vector::{MetadataFilter, QueryHit, VectorStore};

/// 검색 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub source_file: String,
    /// 0.0 ~ 1.0 (높을수록 유사)
    pub similarity: f32,
    pub content: String,
    pub file_type: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
}

impl From<QueryHit> for SearchResult {
    fn from(hit: QueryHit) -> Self {
        Self {
            similarity: similarity_from_distance(hit.distance),
            source_file: hit.metadata.file_name,
            content: hit.text,
            file_type: hit.metadata.file_type,
            chunk_index: hit.metadata.chunk_index,
            total_chunks: hit.metadata.total_chunks,
        }
    }
}

/// 검색 서비스
pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    max_top_k: usize,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        max_top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            max_top_k,
        }
    }

    /// 유사도 검색
    ///
    /// 빈 질의, 범위를 벗어난 top_k, 빈 파일 필터는 임베딩 전에 거부합니다.
    /// 결과는 유사도 내림차순이며 동점은 삽입 순서를 따릅니다.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        file_filter: Option<&str>,
    ) -> Result<Vec<SearchResult>, KbError> {
        if query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        if top_k == 0 || top_k > self.max_top_k {
            return Err(ValidationError::InvalidTopK {
                value: top_k,
                max: self.max_top_k,
            }
            .into());
        }
        let filter = file_filter
            .map(|name| MetadataFilter::file_name(name))
            .transpose()?;

        let vector = self.embedder.embed(query).await?;
        let hits = self.store.query(&vector, top_k, filter.as_ref()).await?;

        tracing::debug!(
            "Search returned {} hits (top_k={}, filter={:?})",
            hits.len(),
            top_k,
            filter.as_ref().map(|f| f.to_string())
        );

        Ok(hits.into_iter().map(SearchResult::from).collect())
    }
}

/// 거리 → 표시용 유사도
pub fn similarity_from_distance(distance: f32) -> f32 {
    let similarity = (1.0 - distance).clamp(0.0, 1.0);
    (similarity * 1000.0).round() / 1000.0
}

// ============================================================================
// Tests
// ============================================================================
