//! kbase - 로컬 문서 지식 베이스
//!
//! 텍스트/마크다운/PDF/Word/Excel 파일을 청크로 나눠 로컬 임베딩 모델로
//! 벡터화하고, LanceDB에 저장해 유사도 검색과 파일 단위 삭제를 제공합니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod loader;
pub mod report;
pub mod storage;

// Re-exports
pub use config::{get_data_dir, KbConfig, ReingestPolicy};
pub use embedding::{EmbeddingProvider, FastEmbedProvider};
pub use error::{KbError, Result};
pub use knowledge::{
    ClearReport, DeleteReport, DeleteStatus, FileStats, IngestOutcome, IngestReport,
    KnowledgeBase, LanceVectorStore, SearchResult, UploadRequest, VectorStore,
};
pub use loader::{load_document, Document, FileKind};
pub use report::{ConsoleReporter, MessageLevel, NullReporter, Reporter};
pub use storage::FileStore;
