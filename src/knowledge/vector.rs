//! Vector Store - 벡터 저장소 트레이트 및 레코드 타입
//!
//! 청크 ID를 키로 (텍스트, 벡터, 메타데이터)를 저장합니다.
//! 거리는 코사인 거리(1 - 코사인 유사도)이며, 작을수록 가깝습니다.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, ValidationError};

/// 지식베이스 레코드 태그 (metadata.embedding_type)
pub const EMBEDDING_TYPE: &str = "knowledge_base";

// ============================================================================
// Types
// ============================================================================

/// 청크 메타데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_name: String,
    pub file_type: String,
    pub file_path: String,
    /// 파일 내 청크 순서 (0-based)
    pub chunk_index: u32,
    /// 수집 시점의 파일 전체 청크 수
    pub total_chunks: u32,
    pub embedding_type: String,
}

impl ChunkMetadata {
    /// 필터 대상 필드 값
    pub fn field(&self, field: MetadataField) -> &str {
        match field {
            MetadataField::FileName => &self.file_name,
            MetadataField::FileType => &self.file_type,
            MetadataField::FilePath => &self.file_path,
            MetadataField::EmbeddingType => &self.embedding_type,
        }
    }
}

/// 저장 단위 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    /// 병렬 시퀀스(ids, texts, vectors, metadatas)를 레코드로 묶음
    ///
    /// 네 시퀀스의 길이가 다르면 `InvalidBatch`.
    pub fn zip(
        ids: Vec<String>,
        texts: Vec<String>,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
    ) -> Result<Vec<Self>, StoreError> {
        let n = ids.len();
        if texts.len() != n || vectors.len() != n || metadatas.len() != n {
            return Err(StoreError::InvalidBatch(format!(
                "length mismatch: ids={}, texts={}, vectors={}, metadatas={}",
                n,
                texts.len(),
                vectors.len(),
                metadatas.len()
            )));
        }

        Ok(ids
            .into_iter()
            .zip(texts)
            .zip(vectors)
            .zip(metadatas)
            .map(|(((id, text), vector), metadata)| Self {
                id,
                text,
                vector,
                metadata,
            })
            .collect())
    }
}

/// 필터 가능한 메타데이터 필드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    FileName,
    FileType,
    FilePath,
    EmbeddingType,
}

impl MetadataField {
    /// 저장소 컬럼 이름
    pub fn column(&self) -> &'static str {
        match self {
            Self::FileName => "file_name",
            Self::FileType => "file_type",
            Self::FilePath => "file_path",
            Self::EmbeddingType => "embedding_type",
        }
    }
}

impl FromStr for MetadataField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "file_name" => Ok(Self::FileName),
            "file_type" => Ok(Self::FileType),
            "file_path" => Ok(Self::FilePath),
            "embedding_type" => Ok(Self::EmbeddingType),
            other => Err(ValidationError::InvalidFilter(format!(
                "unknown metadata field '{}'",
                other
            ))),
        }
    }
}

/// 메타데이터 정확 일치 필터 (필드 하나)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    pub field: MetadataField,
    pub value: String,
}

impl MetadataFilter {
    pub fn new(field: MetadataField, value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::InvalidFilter(format!(
                "empty value for '{}'",
                field.column()
            )));
        }
        Ok(Self { field, value })
    }

    /// file_name 필터
    pub fn file_name(name: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(MetadataField::FileName, name)
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        metadata.field(self.field) == self.value
    }

    /// SQL WHERE 절 (작은따옴표 이스케이프)
    pub fn to_sql(&self) -> String {
        format!("{} = {}", self.field.column(), quote_sql(&self.value))
    }
}

impl FromStr for MetadataFilter {
    type Err = ValidationError;

    /// `field=value` 형식
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s.split_once('=').ok_or_else(|| {
            ValidationError::InvalidFilter(format!("expected field=value, got '{}'", s))
        })?;
        Self::new(field.parse()?, value)
    }
}

impl fmt::Display for MetadataFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field.column(), self.value)
    }
}

/// 유사도 검색 결과 (거리 오름차순)
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// 코사인 거리 (작을수록 유사)
    pub distance: f32,
}

/// `get_all`에 포함할 필드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Include {
    pub texts: bool,
    pub metadatas: bool,
    pub vectors: bool,
}

impl Include {
    pub const ALL: Self = Self {
        texts: true,
        metadatas: true,
        vectors: true,
    };

    pub const METADATAS: Self = Self {
        texts: false,
        metadatas: true,
        vectors: false,
    };

    pub const IDS: Self = Self {
        texts: false,
        metadatas: false,
        vectors: false,
    };
}

/// 저장소 전체 스냅샷 (삽입 순서)
///
/// 포함하지 않은 필드는 빈 벡터입니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub ids: Vec<String>,
    pub texts: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub vectors: Vec<Vec<f32>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 레코드 업서트 (호출 단위 원자적: 전부 쓰이거나 전혀 쓰이지 않음)
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<usize, StoreError>;

    /// 유사도 검색 (거리 오름차순, 동점은 삽입 순서), 최대 top_k 개
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>, StoreError>;

    /// 전체(또는 필터된) 스냅샷. 빈 저장소면 빈 스냅샷
    async fn get_all(
        &self,
        include: Include,
        filter: Option<&MetadataFilter>,
    ) -> Result<Snapshot, StoreError>;

    /// ID로 삭제 (없는 ID는 무시). 실제 삭제된 개수 반환
    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError>;

    /// 레코드 개수
    async fn count(&self) -> Result<usize, StoreError>;

    /// 병렬 시퀀스 형태의 업서트
    async fn upsert_columns(
        &self,
        ids: Vec<String>,
        texts: Vec<String>,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
    ) -> Result<usize, StoreError> {
        let records = ChunkRecord::zip(ids, texts, vectors, metadatas)?;
        self.upsert(&records).await
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 배치 검증: 빈 ID, 배치 내 중복 ID, 벡터 차원
pub(crate) fn validate_records(
    records: &[ChunkRecord],
    dimension: Option<usize>,
) -> Result<(), StoreError> {
    let mut seen = HashSet::with_capacity(records.len());
    let expected = dimension.or_else(|| records.first().map(|r| r.vector.len()));

    for record in records {
        if record.id.is_empty() {
            return Err(StoreError::InvalidBatch("empty id".to_string()));
        }
        if !seen.insert(record.id.as_str()) {
            return Err(StoreError::InvalidBatch(format!(
                "duplicate id in batch: {}",
                record.id
            )));
        }
        if let Some(expected) = expected {
            if record.vector.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: record.vector.len(),
                });
            }
        }
    }

    Ok(())
}

/// SQL 문자열 리터럴
pub(crate) fn quote_sql(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 코사인 거리 (0.0 ~ 2.0)
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

// ============================================================================
// Tests
// ============================================================================
