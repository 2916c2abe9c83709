//! 에러 타입
//!
//! 관심사별 에러 열거형입니다. 파일 단위의 예상된 실패(로드 불가, 임베딩 실패 등)는
//! 에러가 아니라 `IngestOutcome` / `DeleteReport` 값으로 보고되고,
//! 여기의 타입은 그 사유와 인프라 장애를 표현합니다.

use std::path::PathBuf;

use thiserror::Error;

/// 최상위 에러 (초기화 및 인프라 장애)
#[derive(Debug, Error)]
pub enum KbError {
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("split error: {0}")]
    Split(#[from] SplitError),

    #[error("embedding error: {0}")]
    Embed(#[from] EmbedError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("config error: {0}")]
    Config(String),

    #[error("upload log error: {0}")]
    UploadLog(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 문서 로드 에러
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("no text could be extracted from {0:?}")]
    Empty(PathBuf),
}

impl LoadError {
    pub(crate) fn parse(path: &std::path::Path, message: impl ToString) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// 청킹 설정 에러
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// 임베딩 에러
#[derive(Debug, Error)]
pub enum EmbedError {
    /// 지정한 모델을 찾을 수 없음 (기본 모델로 폴백 전)
    #[error("embedding model not found: {name}")]
    ModelNotFound { name: String },

    /// 지정 모델도, 기본 모델도 사용할 수 없음
    #[error("embedding model '{requested}' unavailable and default model '{fallback}' also failed: {message}")]
    FallbackUnavailable {
        requested: String,
        fallback: String,
        message: String,
    },

    #[error("failed to load embedding model '{name}': {message}")]
    ModelLoad { name: String, message: String },

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// 벡터 저장소 에러
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open vector store at {path:?}: {message}")]
    Connect { path: PathBuf, message: String },

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    #[error("vector dimension mismatch: store expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("write failed: {0}")]
    Write(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("delete failed: {0}")]
    Delete(String),
}

/// 입력 검증 에러
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("query text is empty")]
    EmptyQuery,

    #[error("top_k must be between 1 and {max}, got {value}")]
    InvalidTopK { value: usize, max: usize },

    #[error("invalid metadata filter: {0}")]
    InvalidFilter(String),

    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),
}

/// 파일/벡터 레코드 불일치
#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error("{remaining} vector records for '{file_name}' remain after delete")]
    RecordsRemain { file_name: String, remaining: usize },
}

pub type Result<T> = std::result::Result<T, KbError>;
