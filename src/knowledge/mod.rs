//! Knowledge 모듈 - 벡터 지식 베이스
//!
//! - Chunker: 재귀 문자 분할 (문단 → 줄 → 단어 → 문자)
//! - VectorStore: LanceDB(영구) 구현, 테스트용 메모리 구현
//! - Ingest / Retrieve / Delete: 파일 단위 수집, 유사도 검색, 일관된 삭제
//! - UploadLog: SQLite 업로드 기록
//! - KnowledgeBase: 위 구성 요소를 묶은 파사드

mod base;
mod chunker;
mod delete;
mod ingest;
mod lance;
#[cfg(test)]
mod memory;
mod retrieve;
mod store;
mod vector;

// Re-exports
pub use base::{
    ClearReport, CollectionSummary, FileStats, KnowledgeBase, RecordPreview, StorageSummary,
    UploadRequest,
};
pub use chunker::{recursive_chunker, Chunker, RecursiveChunker};
pub use delete::{BatchDeleteReport, DeleteReport, DeleteStatus, DeletionService};
pub use ingest::{chunk_id, IngestOutcome, IngestPipeline, IngestReport};
pub use lance::LanceVectorStore;
pub use retrieve::{similarity_from_distance, RetrievalService, SearchResult};
pub use store::{NewUpload, UploadEntry, UploadLog, UploadStatus};
pub use vector::{
    cosine_distance, cosine_similarity, ChunkMetadata, ChunkRecord, Include, MetadataField,
    MetadataFilter, QueryHit, Snapshot, VectorStore, EMBEDDING_TYPE,
};
