//! 삭제 서비스
//!
//! 파일 이름 하나로 저장된 파일과 그 파일의 벡터 레코드를 함께 지웁니다.
//! 한쪽이 실패해도 다른 쪽은 시도하며, 어느 쪽이 실패했는지 결과에 남깁니다.
//! 삭제 후 같은 이름의 레코드가 남아 있으면 실패로 보고합니다.

use std::fmt;
use std::sync::Arc;

use crate::error::{ConsistencyError, KbError};
use crate::report::{percent, MessageLevel, Reporter};
use crate::storage::{validate_file_name, FileStore};

use super::vector::{Include, MetadataFilter, VectorStore};

// ============================================================================
// Report Types
// ============================================================================

/// 삭제 결과 분류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteStatus {
    /// 파일과 레코드 모두 삭제
    FileAndRecords,
    /// 파일만 있었음 (레코드 없음)
    FileOnly,
    /// 파일은 없고 레코드만 정리 (고아 레코드)
    OrphanRecords,
    /// 둘 다 없음 (아무것도 하지 않음)
    NotFound,
    /// 한쪽 이상 실패
    Failed {
        file_error: Option<String>,
        record_error: Option<String>,
    },
}

/// 파일 하나의 삭제 보고
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub file_name: String,
    /// 0 또는 1
    pub files_deleted: usize,
    pub vector_records_deleted: usize,
    pub status: DeleteStatus,
}

impl DeleteReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, DeleteStatus::Failed { .. })
    }

    pub fn level(&self) -> MessageLevel {
        match self.status {
            DeleteStatus::FileAndRecords => MessageLevel::Success,
            DeleteStatus::FileOnly | DeleteStatus::OrphanRecords | DeleteStatus::NotFound => {
                MessageLevel::Warning
            }
            DeleteStatus::Failed { .. } => MessageLevel::Error,
        }
    }

    /// 사용자 메시지
    pub fn message(&self) -> String {
        let name = &self.file_name;
        match &self.status {
            DeleteStatus::FileAndRecords => format!(
                "'{}' 삭제 완료: 파일 1개, 벡터 레코드 {}개",
                name, self.vector_records_deleted
            ),
            DeleteStatus::FileOnly => {
                format!("'{}' 파일을 삭제했지만 벡터 레코드는 없었습니다", name)
            }
            DeleteStatus::OrphanRecords => format!(
                "'{}' 파일은 없었고 남아 있던 벡터 레코드 {}개를 정리했습니다",
                name, self.vector_records_deleted
            ),
            DeleteStatus::NotFound => format!("'{}': 파일과 벡터 레코드가 모두 없습니다", name),
            DeleteStatus::Failed {
                file_error,
                record_error,
            } => {
                let mut parts = Vec::new();
                if let Some(e) = file_error {
                    parts.push(format!("파일 삭제 실패: {}", e));
                }
                if let Some(e) = record_error {
                    parts.push(format!("벡터 레코드 삭제 실패: {}", e));
                }
                format!(
                    "'{}' 삭제 실패 (파일 {}개, 레코드 {}개 삭제됨) - {}",
                    name,
                    self.files_deleted,
                    self.vector_records_deleted,
                    parts.join("; ")
                )
            }
        }
    }
}

impl fmt::Display for DeleteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// 여러 파일 삭제 보고
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteReport {
    pub reports: Vec<DeleteReport>,
    pub files_deleted: usize,
    pub vector_records_deleted: usize,
}

impl BatchDeleteReport {
    pub fn failures(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_success()).count()
    }
}

// ============================================================================
// DeletionService
// ============================================================================

/// 삭제 서비스
pub struct DeletionService {
    store: Arc<dyn VectorStore>,
    files: FileStore,
}

impl DeletionService {
    pub fn new(store: Arc<dyn VectorStore>, files: FileStore) -> Self {
        Self { store, files }
    }

    /// 파일 하나 삭제
    ///
    /// 잘못된 파일 이름만 에러이고, 나머지는 `DeleteReport`로 보고합니다.
    pub async fn delete_file(&self, file_name: &str) -> Result<DeleteReport, KbError> {
        validate_file_name(file_name)?;
        let filter = MetadataFilter::file_name(file_name)?;

        // 벡터 레코드
        let (records_deleted, record_error) = match self.delete_records(&filter).await {
            Ok(n) => (n, None),
            Err(e) => {
                tracing::error!("Failed to delete records of {}: {}", file_name, e);
                (0, Some(e.to_string()))
            }
        };

        // 저장 파일 (레코드 실패와 무관하게 시도)
        let (file_deleted, file_error) = match self.files.remove(file_name) {
            Ok(removed) => (removed, None),
            Err(e) => {
                tracing::error!("Failed to delete stored file {}: {}", file_name, e);
                (false, Some(e.to_string()))
            }
        };

        // 남은 레코드 확인
        let record_error = match record_error {
            Some(e) => Some(e),
            None => self.verify_removed(&filter, file_name).await.err(),
        };

        let status = match (file_error, record_error) {
            (None, None) => match (file_deleted, records_deleted > 0) {
                (true, true) => DeleteStatus::FileAndRecords,
                (true, false) => DeleteStatus::FileOnly,
                (false, true) => DeleteStatus::OrphanRecords,
                (false, false) => DeleteStatus::NotFound,
            },
            (file_error, record_error) => DeleteStatus::Failed {
                file_error,
                record_error,
            },
        };

        let report = DeleteReport {
            file_name: file_name.to_string(),
            files_deleted: usize::from(file_deleted),
            vector_records_deleted: records_deleted,
            status,
        };
        tracing::info!("{}", report.message());
        Ok(report)
    }

    /// 여러 파일 삭제 (실패해도 계속 진행)
    pub async fn delete_files(
        &self,
        file_names: &[String],
        reporter: &dyn Reporter,
    ) -> BatchDeleteReport {
        let mut batch = BatchDeleteReport::default();

        for (i, name) in file_names.iter().enumerate() {
            let report = match self.delete_file(name).await {
                Ok(report) => report,
                Err(e) => DeleteReport {
                    file_name: name.clone(),
                    files_deleted: 0,
                    vector_records_deleted: 0,
                    status: DeleteStatus::Failed {
                        file_error: Some(e.to_string()),
                        record_error: None,
                    },
                },
            };

            reporter.message(report.level(), &report.message());
            reporter.progress(percent(i + 1, file_names.len()));

            batch.files_deleted += report.files_deleted;
            batch.vector_records_deleted += report.vector_records_deleted;
            batch.reports.push(report);
        }

        batch
    }

    async fn delete_records(&self, filter: &MetadataFilter) -> Result<usize, KbError> {
        let ids = self.store.get_all(Include::IDS, Some(filter)).await?.ids;
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(self.store.delete(&ids).await?)
    }

    async fn verify_removed(&self, filter: &MetadataFilter, file_name: &str) -> Result<(), String> {
        let remaining = self
            .store
            .get_all(Include::IDS, Some(filter))
            .await
            .map_err(|e| e.to_string())?
            .len();

        if remaining > 0 {
            let err = ConsistencyError::RecordsRemain {
                file_name: file_name.to_string(),
                remaining,
            };
            tracing::error!("{}", err);
            return Err(err.to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::knowledge::memory::MemoryVectorStore;
    use crate::knowledge::vector::{ChunkMetadata, ChunkRecord, QueryHit, Snapshot, EMBEDDING_TYPE};
    use crate::report::RecordingReporter;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn record(id: &str, file_name: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            text: id.to_string(),
            vector: vec![1.0, 0.0],
            metadata: ChunkMetadata {
                file_name: file_name.to_string(),
                file_type: "txt".to_string(),
                file_path: format!("files/{}", file_name),
                chunk_index: 0,
                total_chunks: 1,
                embedding_type: EMBEDDING_TYPE.to_string(),
            },
        }
    }

    async fn setup() -> (TempDir, Arc<MemoryVectorStore>, DeletionService) {
        let dir = TempDir::new().unwrap();
        let files = FileStore::open(dir.path().join("files")).unwrap();
        let store = Arc::new(MemoryVectorStore::new(2));
        let service = DeletionService::new(store.clone(), files);
        (dir, store, service)
    }

    #[tokio::test]
    async fn test_delete_file_and_records() {
        let (_dir, store, service) = setup().await;
        service.files.save_bytes("a.txt", b"x").unwrap();
        store
            .upsert(&[record("1", "a.txt"), record("2", "a.txt"), record("3", "b.txt")])
            .await
            .unwrap();

        let report = service.delete_file("a.txt").await.unwrap();
        assert_eq!(report.status, DeleteStatus::FileAndRecords);
        assert_eq!(report.files_deleted, 1);
        assert_eq!(report.vector_records_deleted, 2);
        assert_eq!(store.count().await.unwrap(), 1);

        // 두 번째 삭제는 에러 없이 NotFound
        let again = service.delete_file("a.txt").await.unwrap();
        assert_eq!(again.status, DeleteStatus::NotFound);

        let filter = MetadataFilter::file_name("a.txt").unwrap();
        assert!(store.get_all(Include::ALL, Some(&filter)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_only_and_orphans() {
        let (_dir, store, service) = setup().await;

        service.files.save_bytes("only.txt", b"x").unwrap();
        let report = service.delete_file("only.txt").await.unwrap();
        assert_eq!(report.status, DeleteStatus::FileOnly);
        assert_eq!(report.files_deleted, 1);

        store.upsert(&[record("1", "orphan.txt")]).await.unwrap();
        let report = service.delete_file("orphan.txt").await.unwrap();
        assert_eq!(report.status, DeleteStatus::OrphanRecords);
        assert_eq!(report.files_deleted, 0);
        assert_eq!(report.vector_records_deleted, 1);
    }

    #[tokio::test]
    async fn test_nothing_to_delete() {
        let (_dir, _store, service) = setup().await;
        let report = service.delete_file("ghost.txt").await.unwrap();
        assert_eq!(report.status, DeleteStatus::NotFound);
        assert!(report.is_success());
        assert_eq!(report.files_deleted, 0);
        assert_eq!(report.vector_records_deleted, 0);
    }

    #[tokio::test]
    async fn test_invalid_name_is_error() {
        let (_dir, _store, service) = setup().await;
        assert!(service.delete_file("../etc/passwd").await.is_err());
    }

    /// delete가 아무것도 지우지 않는 저장소
    struct StubbornStore(MemoryVectorStore);

    #[async_trait]
    impl VectorStore for StubbornStore {
        async fn upsert(&self, records: &[ChunkRecord]) -> Result<usize, StoreError> {
            self.0.upsert(records).await
        }

        async fn query(
            &self,
            vector: &[f32],
            top_k: usize,
            filter: Option<&MetadataFilter>,
        ) -> Result<Vec<QueryHit>, StoreError> {
            self.0.query(vector, top_k, filter).await
        }

        async fn get_all(
            &self,
            include: Include,
            filter: Option<&MetadataFilter>,
        ) -> Result<Snapshot, StoreError> {
            self.0.get_all(include, filter).await
        }

        async fn delete(&self, _ids: &[String]) -> Result<usize, StoreError> {
            Ok(0)
        }

        async fn count(&self) -> Result<usize, StoreError> {
            self.0.count().await
        }
    }

    /// delete가 항상 실패하는 저장소
    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn upsert(&self, _records: &[ChunkRecord]) -> Result<usize, StoreError> {
            Err(StoreError::Write("offline".to_string()))
        }

        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _filter: Option<&MetadataFilter>,
        ) -> Result<Vec<QueryHit>, StoreError> {
            Err(StoreError::Query("offline".to_string()))
        }

        async fn get_all(
            &self,
            _include: Include,
            _filter: Option<&MetadataFilter>,
        ) -> Result<Snapshot, StoreError> {
            Err(StoreError::Query("offline".to_string()))
        }

        async fn delete(&self, _ids: &[String]) -> Result<usize, StoreError> {
            Err(StoreError::Delete("offline".to_string()))
        }

        async fn count(&self) -> Result<usize, StoreError> {
            Err(StoreError::Query("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_remaining_records_are_reported() {
        let dir = TempDir::new().unwrap();
        let files = FileStore::open(dir.path().join("files")).unwrap();
        files.save_bytes("a.txt", b"x").unwrap();

        let inner = MemoryVectorStore::new(2);
        inner.upsert(&[record("1", "a.txt")]).await.unwrap();
        let service = DeletionService::new(Arc::new(StubbornStore(inner)), files);

        let report = service.delete_file("a.txt").await.unwrap();
        match &report.status {
            DeleteStatus::Failed {
                file_error: None,
                record_error: Some(e),
            } => assert!(e.contains("remain")),
            other => panic!("unexpected status: {:?}", other),
        }
        // 파일 쪽은 그대로 진행됨
        assert_eq!(report.files_deleted, 1);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_store_failure_still_removes_file() {
        let dir = TempDir::new().unwrap();
        let files = FileStore::open(dir.path().join("files")).unwrap();
        files.save_bytes("a.txt", b"x").unwrap();
        let service = DeletionService::new(Arc::new(BrokenStore), files.clone());

        let report = service.delete_file("a.txt").await.unwrap();
        assert!(matches!(
            report.status,
            DeleteStatus::Failed {
                file_error: None,
                record_error: Some(_)
            }
        ));
        assert_eq!(report.files_deleted, 1);
        assert!(!files.exists("a.txt").unwrap());
        assert!(report.message().contains("벡터 레코드 삭제 실패"));
    }

    #[tokio::test]
    async fn test_delete_files_batch() {
        let (_dir, store, service) = setup().await;
        service.files.save_bytes("a.txt", b"x").unwrap();
        store.upsert(&[record("1", "a.txt"), record("2", "b.txt")]).await.unwrap();

        let reporter = RecordingReporter::default();
        let names = vec!["a.txt".to_string(), "bad/name".to_string(), "b.txt".to_string()];
        let batch = service.delete_files(&names, &reporter).await;

        assert_eq!(batch.reports.len(), 3);
        assert_eq!(batch.files_deleted, 1);
        assert_eq!(batch.vector_records_deleted, 2);
        assert_eq!(batch.failures(), 1);
        assert_eq!(*reporter.progress.lock().unwrap(), vec![33, 66, 100]);
        assert_eq!(reporter.messages.lock().unwrap().len(), 3);
    }
}
