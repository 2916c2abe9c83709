//! In-memory Vector Store
//!
//! 프로세스 안에서만 유지되는 테스트용 저장소입니다.
//! 전수(brute-force) 코사인 거리로 검색합니다.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;

use super::vector::{
    cosine_distance, validate_records, ChunkRecord, Include, MetadataFilter, QueryHit, Snapshot,
    VectorStore,
};

#[derive(Debug, Default)]
struct Inner {
    /// id -> (삽입 순번, 레코드)
    records: HashMap<String, (u64, ChunkRecord)>,
    next_seq: u64,
}

impl Inner {
    /// 삽입 순서로 정렬된 레코드
    fn ordered(&self) -> Vec<&(u64, ChunkRecord)> {
        let mut entries: Vec<_> = self.records.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries
    }
}

/// 메모리 벡터 저장소
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    dimension: Option<usize>,
    inner: RwLock<Inner>,
}

impl MemoryVectorStore {
    /// 차원을 고정한 저장소
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// 첫 레코드 차원을 따르는 저장소
    pub fn unbounded() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut inner = self.inner.write().await;

        let dimension = self.dimension.or_else(|| {
            inner
                .records
                .values()
                .next()
                .map(|(_, r)| r.vector.len())
        });
        validate_records(records, dimension)?;

        for record in records {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner
                .records
                .insert(record.id.clone(), (seq, record.clone()));
        }

        tracing::debug!("Upserted {} records (memory)", records.len());
        Ok(records.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryHit>, StoreError> {
        if top_k == 0 {
            return Ok(vec![]);
        }
        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        let inner = self.inner.read().await;

        // 정렬 안정성: 삽입 순서로 먼저 나열한 뒤 거리로 안정 정렬
        let mut scored: Vec<(f32, &ChunkRecord)> = inner
            .ordered()
            .into_iter()
            .filter(|(_, r)| filter.map_or(true, |f| f.matches(&r.metadata)))
            .map(|(_, r)| (cosine_distance(vector, &r.vector), r))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(distance, r)| QueryHit {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                distance,
            })
            .collect())
    }

    async fn get_all(
        &self,
        include: Include,
        filter: Option<&MetadataFilter>,
    ) -> Result<Snapshot, StoreError> {
        let inner = self.inner.read().await;
        let mut snapshot = Snapshot::default();

        for (_, record) in inner.ordered() {
            if !filter.map_or(true, |f| f.matches(&record.metadata)) {
                continue;
            }
            snapshot.ids.push(record.id.clone());
            if include.texts {
                snapshot.texts.push(record.text.clone());
            }
            if include.metadatas {
                snapshot.metadatas.push(record.metadata.clone());
            }
            if include.vectors {
                snapshot.vectors.push(record.vector.clone());
            }
        }

        Ok(snapshot)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let deleted = ids
            .iter()
            .filter(|id| inner.records.remove(id.as_str()).is_some())
            .count();
        tracing::debug!("Deleted {} records (memory)", deleted);
        Ok(deleted)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.records.len())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::vector::{ChunkMetadata, EMBEDDING_TYPE};

    fn record(id: &str, file_name: &str, vector: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            text: format!("text of {}", id),
            vector,
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

    #[tokio::test]
    async fn test_upsert_and_get_all_round_trip() {
        let store = MemoryVectorStore::new(2);
        let records = vec![
            record("a", "a.txt", vec![1.0, 0.0]),
            record("b", "a.txt", vec![0.0, 1.0]),
            record("c", "b.txt", vec![1.0, 1.0]),
        ];
        assert_eq!(store.upsert(&records).await.unwrap(), 3);

        let snapshot = store.get_all(Include::ALL, None).await.unwrap();
        assert_eq!(snapshot.ids, vec!["a", "b", "c"]);
        assert_eq!(snapshot.texts[1], "text of b");
        assert_eq!(snapshot.metadatas[2].file_name, "b.txt");
        assert_eq!(snapshot.vectors[0], vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let store = MemoryVectorStore::new(2);
        store.upsert(&[record("a", "a.txt", vec![1.0, 0.0])]).await.unwrap();
        store.upsert(&[record("a", "b.txt", vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let snapshot = store.get_all(Include::METADATAS, None).await.unwrap();
        assert_eq!(snapshot.metadatas[0].file_name, "b.txt");
    }

    #[tokio::test]
    async fn test_invalid_batch_writes_nothing() {
        let store = MemoryVectorStore::new(2);
        let records = vec![
            record("a", "a.txt", vec![1.0, 0.0]),
            record("b", "a.txt", vec![1.0]),
        ];
        assert!(store.upsert(&records).await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_order_and_ties() {
        let store = MemoryVectorStore::new(2);
        store
            .upsert(&[
                record("far", "a.txt", vec![0.0, 1.0]),
                record("tie1", "a.txt", vec![1.0, 0.0]),
                record("tie2", "b.txt", vec![2.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 10, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["tie1", "tie2", "far"]);
        assert!(hits[0].distance <= hits[2].distance);

        let hits = store.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_query_with_filter() {
        let store = MemoryVectorStore::new(2);
        store
            .upsert(&[
                record("a", "a.txt", vec![1.0, 0.0]),
                record("b", "b.txt", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let filter = MetadataFilter::file_name("b.txt").unwrap();
        let hits = store.query(&[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");

        let none = MetadataFilter::file_name("missing.txt").unwrap();
        assert!(store.query(&[1.0, 0.0], 5, Some(&none)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryVectorStore::new(2);
        store.upsert(&[record("a", "a.txt", vec![1.0, 0.0])]).await.unwrap();

        let ids = vec!["a".to_string()];
        assert_eq!(store.delete(&ids).await.unwrap(), 1);
        assert_eq!(store.delete(&ids).await.unwrap(), 0);
        assert!(store.get_all(Include::IDS, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryVectorStore::unbounded();
        assert!(store.get_all(Include::ALL, None).await.unwrap().is_empty());
        assert!(store.query(&[1.0], 3, None).await.unwrap().is_empty());
    }
}
