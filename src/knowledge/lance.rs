//! LanceDB Vector Store - 영속 벡터 컬렉션
//!
//! 컬렉션 하나가 LanceDB 테이블 하나입니다. 프로세스를 재시작해도
//! ID → 레코드 매핑이 그대로 유지됩니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::table::Table;
use lancedb::DistanceType;
use tokio::sync::Mutex;

use crate::error::StoreError;

use super::vector::{
    quote_sql, validate_records, ChunkMetadata, ChunkRecord, Include, MetadataFilter, QueryHit,
    Snapshot, VectorStore,
};

/// 한 번의 DELETE 문에 넣을 최대 ID 수
const DELETE_BATCH: usize = 256;

/// 검색 시 top_k 이후로 더 가져오는 행 수 (경계 동점 판정용)
const TIE_MARGIN: usize = 16;

const METADATA_COLUMNS: [&str; 6] = [
    "file_name",
    "file_type",
    "file_path",
    "chunk_index",
    "total_chunks",
    "embedding_type",
];

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    path: PathBuf,
    table_name: String,
    dimension: usize,
    /// 다음 삽입 순번 (첫 upsert 때 테이블에서 읽어 캐시)
    next_seq: Mutex<Option<i64>>,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// 기존 테이블의 벡터 차원이 `dimension`과 다르면 `DimensionMismatch`.
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `table_name` - 컬렉션 이름
    /// * `dimension` - 임베딩 차원
    pub async fn open(path: &Path, table_name: &str, dimension: usize) -> Result<Self, StoreError> {
        let connect_err = |message: String| StoreError::Connect {
            path: path.to_path_buf(),
            message,
        };

        if dimension == 0 {
            return Err(connect_err("embedding dimension must be positive".to_string()));
        }

        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| connect_err(format!("failed to create directory: {}", e)))?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| connect_err("invalid path encoding".to_string()))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        let store = Self {
            db,
            path: path.to_path_buf(),
            table_name: table_name.to_string(),
            dimension,
            next_seq: Mutex::new(None),
        };

        if let Some(table) = store.open_table().await? {
            let existing = store.table_dimension(&table).await?;
            if existing != dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: existing,
                    actual: dimension,
                });
            }
        }

        tracing::debug!(
            "Opened vector store {:?} (collection={}, dimension={})",
            store.path,
            store.table_name,
            dimension
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 컬렉션 테이블 스키마
    fn create_schema(dimension: usize) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("file_name", DataType::Utf8, false),
            Field::new("file_type", DataType::Utf8, false),
            Field::new("file_path", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("total_chunks", DataType::Int32, false),
            Field::new("embedding_type", DataType::Utf8, false),
            Field::new("seq", DataType::Int64, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
        ])
    }

    /// 레코드들을 Arrow RecordBatch로 변환 (seq는 seq_start부터 증가)
    fn records_to_batch(
        &self,
        records: &[ChunkRecord],
        seq_start: i64,
    ) -> Result<RecordBatch, StoreError> {
        let chunk_indices: Vec<i32> = records
            .iter()
            .map(|r| r.metadata.chunk_index as i32)
            .collect();
        let total_chunks: Vec<i32> = records
            .iter()
            .map(|r| r.metadata.total_chunks as i32)
            .collect();
        let seqs: Vec<i64> = (0..records.len() as i64).map(|i| seq_start + i).collect();

        // 벡터를 FixedSizeList로 변환
        let flat: Vec<f32> = records
            .iter()
            .flat_map(|r| r.vector.iter().copied())
            .collect();
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
            None,
        )
        .map_err(|e| StoreError::InvalidBatch(format!("failed to build vector array: {}", e)))?;

        RecordBatch::try_new(
            Arc::new(Self::create_schema(self.dimension)),
            vec![
                Arc::new(string_array(records, |r| r.id.as_str())),
                Arc::new(string_array(records, |r| r.text.as_str())),
                Arc::new(string_array(records, |r| r.metadata.file_name.as_str())),
                Arc::new(string_array(records, |r| r.metadata.file_type.as_str())),
                Arc::new(string_array(records, |r| r.metadata.file_path.as_str())),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(Int32Array::from(total_chunks)),
                Arc::new(string_array(records, |r| r.metadata.embedding_type.as_str())),
                Arc::new(Int64Array::from(seqs)),
                Arc::new(vectors),
            ],
        )
        .map_err(|e| StoreError::InvalidBatch(format!("failed to build record batch: {}", e)))
    }

    /// 테이블 열기 (없으면 None)
    async fn open_table(&self) -> Result<Option<Table>, StoreError> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| StoreError::Query(format!("failed to list tables: {}", e)))?;

        if !names.contains(&self.table_name) {
            return Ok(None);
        }

        self.db
            .open_table(&self.table_name)
            .execute()
            .await
            .map(Some)
            .map_err(|e| StoreError::Query(format!("failed to open table: {}", e)))
    }

    /// 기존 테이블의 벡터 차원
    async fn table_dimension(&self, table: &Table) -> Result<usize, StoreError> {
        let schema = table
            .schema()
            .await
            .map_err(|e| StoreError::Query(format!("failed to read schema: {}", e)))?;

        match schema.field_with_name("vector").map(|f| f.data_type()) {
            Ok(DataType::FixedSizeList(_, size)) => Ok(*size as usize),
            _ => Err(StoreError::Query(format!(
                "collection '{}' has no vector column",
                self.table_name
            ))),
        }
    }

    /// 벡터 검색 후 (거리, 삽입 순번) 순으로 정렬한 `limit`개 행
    async fn search_rows(
        &self,
        table: &Table,
        vector: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(i64, QueryHit)>, StoreError> {
        let mut query = table
            .vector_search(vector.to_vec())
            .map_err(|e| StoreError::Query(format!("failed to create vector search: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .limit(limit);

        // 필터는 랭킹 전에 적용 (prefilter)
        if let Some(filter) = filter {
            query = query.only_if(filter.to_sql());
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| StoreError::Query(format!("failed to execute vector search: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut hits: Vec<(i64, QueryHit)> = Vec::new();

        for batch in &batches {
            let ids = string_column(batch, "id")?;
            let texts = string_column(batch, "text")?;
            let seqs = int64_column(batch, "seq")?;
            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| StoreError::Query("missing _distance column".to_string()))?;

            for i in 0..batch.num_rows() {
                hits.push((
                    seqs.value(i),
                    QueryHit {
                        id: ids.value(i).to_string(),
                        text: texts.value(i).to_string(),
                        metadata: read_metadata(batch, i)?,
                        distance: distances.value(i),
                    },
                ));
            }
        }

        // 거리 오름차순, 동점은 삽입 순서
        hits.sort_by(|a, b| a.1.distance.total_cmp(&b.1.distance).then(a.0.cmp(&b.0)));
        Ok(hits)
    }

    /// 테이블의 최대 순번 + 1 (열린 뒤 한 번만 스캔)
    async fn scan_next_seq(&self, table: &Table) -> Result<i64, StoreError> {
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        if rows == 0 {
            return Ok(0);
        }

        let batches: Vec<RecordBatch> = table
            .query()
            .select(Select::columns(&["seq"]))
            .limit(rows)
            .execute()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut max = -1i64;
        for batch in &batches {
            let seqs = int64_column(batch, "seq")?;
            for i in 0..batch.num_rows() {
                max = max.max(seqs.value(i));
            }
        }
        Ok(max + 1)
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        validate_records(records, Some(self.dimension))?;

        // 순번 할당부터 커밋까지 직렬화
        let mut next_seq = self.next_seq.lock().await;
        let table = self.open_table().await?;
        let seq_start = match (*next_seq, &table) {
            (Some(seq), Some(_)) => seq,
            (None, Some(t)) => self.scan_next_seq(t).await?,
            (_, None) => 0,
        };

        let batch = self.records_to_batch(records, seq_start)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        match table {
            Some(table) => {
                // id 기준 merge: 단일 커밋이므로 호출 단위로 원자적
                let mut merge = table.merge_insert(&["id"]);
                merge
                    .when_matched_update_all(None)
                    .when_not_matched_insert_all();
                merge
                    .execute(Box::new(batches))
                    .await
                    .map_err(|e| StoreError::Write(format!("failed to upsert records: {}", e)))?;
            }
            None => {
                self.db
                    .create_table(&self.table_name, batches)
                    .execute()
                    .await
                    .map_err(|e| StoreError::Write(format!("failed to create collection: {}", e)))?;
            }
        }

        *next_seq = Some(seq_start + records.len() as i64);
        tracing::debug!("Upserted {} records into {}", records.len(), self.table_name);
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
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let Some(table) = self.open_table().await? else {
            return Ok(vec![]);
        };

        // 경계 거리의 동점이 여유분 끝까지 이어지면 후보 전체를 다시 검색
        let limit = top_k.saturating_add(TIE_MARGIN);
        let mut hits = self.search_rows(&table, vector, limit, filter).await?;
        if hits.len() == limit && hits[limit - 1].1.distance <= hits[top_k - 1].1.distance {
            let total = table
                .count_rows(filter.map(MetadataFilter::to_sql))
                .await
                .map_err(|e| StoreError::Query(format!("failed to count rows: {}", e)))?;
            tracing::debug!("Tied distances at top_k cutoff, scanning {} rows", total);
            hits = self.search_rows(&table, vector, total, filter).await?;
        }
        hits.truncate(top_k);

        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }

    async fn get_all(
        &self,
        include: Include,
        filter: Option<&MetadataFilter>,
    ) -> Result<Snapshot, StoreError> {
        let Some(table) = self.open_table().await? else {
            return Ok(Snapshot::default());
        };

        let rows = table
            .count_rows(filter.map(MetadataFilter::to_sql))
            .await
            .map_err(|e| StoreError::Query(format!("failed to count rows: {}", e)))?;
        if rows == 0 {
            return Ok(Snapshot::default());
        }

        let mut columns = vec!["id", "seq"];
        if include.texts {
            columns.push("text");
        }
        if include.metadatas {
            columns.extend(METADATA_COLUMNS);
        }
        if include.vectors {
            columns.push("vector");
        }

        let mut query = table.query().select(Select::columns(&columns[..])).limit(rows);
        if let Some(filter) = filter {
            query = query.only_if(filter.to_sql());
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        // (seq, id, text, metadata, vector)
        type Row = (i64, String, Option<String>, Option<ChunkMetadata>, Option<Vec<f32>>);
        let mut collected: Vec<Row> = Vec::with_capacity(rows);

        for batch in &batches {
            let ids = string_column(batch, "id")?;
            let seqs = int64_column(batch, "seq")?;
            let texts = if include.texts {
                Some(string_column(batch, "text")?)
            } else {
                None
            };
            let vectors = if include.vectors {
                Some(
                    batch
                        .column_by_name("vector")
                        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
                        .ok_or_else(|| StoreError::Query("missing vector column".to_string()))?,
                )
            } else {
                None
            };

            for i in 0..batch.num_rows() {
                let metadata = if include.metadatas {
                    Some(read_metadata(batch, i)?)
                } else {
                    None
                };
                let vector = match vectors {
                    Some(list) => Some(read_vector(list, i)?),
                    None => None,
                };
                collected.push((
                    seqs.value(i),
                    ids.value(i).to_string(),
                    texts.map(|t| t.value(i).to_string()),
                    metadata,
                    vector,
                ));
            }
        }

        collected.sort_by_key(|row| row.0);

        let mut snapshot = Snapshot::default();
        for (_, id, text, metadata, vector) in collected {
            snapshot.ids.push(id);
            snapshot.texts.extend(text);
            snapshot.metadatas.extend(metadata);
            snapshot.vectors.extend(vector);
        }
        Ok(snapshot)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        // 삭제 전 개수 확인
        let before = self.count().await?;

        for batch in ids.chunks(DELETE_BATCH) {
            let list = batch
                .iter()
                .map(|id| quote_sql(id))
                .collect::<Vec<_>>()
                .join(", ");
            table
                .delete(&format!("id IN ({})", list))
                .await
                .map_err(|e| StoreError::Delete(e.to_string()))?;
        }

        let after = self.count().await?;
        let deleted = before.saturating_sub(after);
        tracing::debug!("Deleted {} records from {}", deleted, self.table_name);
        Ok(deleted)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        table
            .count_rows(None)
            .await
            .map_err(|e| StoreError::Query(format!("failed to count rows: {}", e)))
    }
}

// ============================================================================
// Column Helpers
// ============================================================================

fn string_array(records: &[ChunkRecord], f: impl Fn(&ChunkRecord) -> &str) -> StringArray {
    StringArray::from(records.iter().map(f).collect::<Vec<_>>())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StoreError::Query(format!("missing {} column", name)))
}

fn int32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| StoreError::Query(format!("missing {} column", name)))
}

fn int64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| StoreError::Query(format!("missing {} column", name)))
}

fn read_metadata(batch: &RecordBatch, row: usize) -> Result<ChunkMetadata, StoreError> {
    Ok(ChunkMetadata {
        file_name: string_column(batch, "file_name")?.value(row).to_string(),
        file_type: string_column(batch, "file_type")?.value(row).to_string(),
        file_path: string_column(batch, "file_path")?.value(row).to_string(),
        chunk_index: int32_column(batch, "chunk_index")?.value(row) as u32,
        total_chunks: int32_column(batch, "total_chunks")?.value(row) as u32,
        embedding_type: string_column(batch, "embedding_type")?
            .value(row)
            .to_string(),
    })
}

fn read_vector(list: &FixedSizeListArray, row: usize) -> Result<Vec<f32>, StoreError> {
    let values = list.value(row);
    let floats = values
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| StoreError::Query("vector column is not float32".to_string()))?;
    Ok(floats.values().to_vec())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::vector::EMBEDDING_TYPE;
    use tempfile::TempDir;

    const DIM: usize = 4;

    fn create_test_record(
        id: &str,
        file_name: &str,
        index: u32,
        vector: [f32; DIM],
    ) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            text: format!("chunk {} of {}", index, file_name),
            vector: vector.to_vec(),
            metadata: ChunkMetadata {
                file_name: file_name.to_string(),
                file_type: "text/plain".to_string(),
                file_path: format!("files/{}", file_name),
                chunk_index: index,
                total_chunks: 2,
                embedding_type: EMBEDDING_TYPE.to_string(),
            },
        }
    }

    async fn open_store(temp: &TempDir) -> LanceVectorStore {
        LanceVectorStore::open(&temp.path().join("test.lance"), "knowledge_base", DIM)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_lance_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        // 초기 상태
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.get_all(Include::ALL, None).await.unwrap().is_empty());
        assert!(store.query(&[1.0, 0.0, 0.0, 0.0], 3, None).await.unwrap().is_empty());

        let records = vec![
            create_test_record("a0", "a.txt", 0, [1.0, 0.0, 0.0, 0.0]),
            create_test_record("a1", "a.txt", 1, [0.0, 1.0, 0.0, 0.0]),
        ];
        assert_eq!(store.upsert(&records).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);

        // 라운드트립
        let snapshot = store.get_all(Include::ALL, None).await.unwrap();
        assert_eq!(snapshot.ids, vec!["a0", "a1"]);
        assert_eq!(snapshot.texts[0], records[0].text);
        assert_eq!(snapshot.metadatas[1], records[1].metadata);
        assert_eq!(snapshot.vectors[1], records[1].vector);
    }

    #[tokio::test]
    async fn test_lance_upsert_same_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert(&[create_test_record("x", "a.txt", 0, [1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(&[create_test_record("x", "b.txt", 0, [0.0, 1.0, 0.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let snapshot = store.get_all(Include::METADATAS, None).await.unwrap();
        assert_eq!(snapshot.metadatas[0].file_name, "b.txt");
    }

    #[tokio::test]
    async fn test_lance_rejects_bad_batch() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let mut bad = create_test_record("a", "a.txt", 0, [1.0, 0.0, 0.0, 0.0]);
        bad.vector.pop();
        let records = vec![create_test_record("b", "a.txt", 1, [1.0, 0.0, 0.0, 0.0]), bad];

        assert!(store.upsert(&records).await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lance_search_order_and_filter() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert(&[
                create_test_record("a0", "a.txt", 0, [1.0, 0.0, 0.0, 0.0]),
                create_test_record("a1", "a.txt", 1, [0.0, 1.0, 0.0, 0.0]),
                create_test_record("b0", "b.txt", 0, [0.9, 0.1, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let query = [1.0, 0.0, 0.0, 0.0];
        let hits = store.query(&query, 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a0");
        assert_eq!(hits[1].id, "b0");
        assert!(hits[0].distance <= hits[1].distance);

        let filter = MetadataFilter::file_name("a.txt").unwrap();
        let hits = store.query(&query, 5, Some(&filter)).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "a1"]);

        let missing = MetadataFilter::file_name("nothing.txt").unwrap();
        assert!(store.query(&query, 5, Some(&missing)).await.unwrap().is_empty());

        let snapshot = store.get_all(Include::IDS, Some(&filter)).await.unwrap();
        assert_eq!(snapshot.ids, vec!["a0", "a1"]);
    }

    #[tokio::test]
    async fn test_lance_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert(&[
                create_test_record("a0", "a.txt", 0, [1.0, 0.0, 0.0, 0.0]),
                create_test_record("it's", "a.txt", 1, [0.0, 1.0, 0.0, 0.0]),
                create_test_record("b0", "b.txt", 0, [0.0, 0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let ids = vec!["a0".to_string(), "it's".to_string()];
        assert_eq!(store.delete(&ids).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);

        // 두 번째 삭제는 에러 없이 0
        assert_eq!(store.delete(&ids).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lance_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open_store(&temp_dir).await;
            store
                .upsert(&[create_test_record("a0", "a.txt", 0, [1.0, 0.0, 0.0, 0.0])])
                .await
                .unwrap();
        }

        let store = open_store(&temp_dir).await;
        let snapshot = store.get_all(Include::ALL, None).await.unwrap();
        assert_eq!(snapshot.ids, vec!["a0"]);
        assert_eq!(snapshot.metadatas[0].file_name, "a.txt");

        // 차원이 다르면 열기 실패
        let result =
            LanceVectorStore::open(&temp_dir.path().join("test.lance"), "knowledge_base", 8).await;
        assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn test_lance_ties_keep_insertion_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        // 동일 벡터 40개를 여러 번에 나눠 삽입
        for batch in (0..40).collect::<Vec<u32>>().chunks(7) {
            let records: Vec<_> = batch
                .iter()
                .map(|&i| {
                    create_test_record(&format!("t{:02}", i), "t.txt", i, [1.0, 1.0, 0.0, 0.0])
                })
                .collect();
            store.upsert(&records).await.unwrap();
        }

        let hits = store.query(&[1.0, 1.0, 0.0, 0.0], 3, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["t00", "t01", "t02"]);

        let filter = MetadataFilter::file_name("t.txt").unwrap();
        let hits = store.query(&[1.0, 1.0, 0.0, 0.0], 5, Some(&filter)).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["t00", "t01", "t02", "t03", "t04"]);
    }

    #[tokio::test]
    async fn test_lance_seq_continues_after_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open_store(&temp_dir).await;
            store
                .upsert(&[create_test_record("a0", "a.txt", 0, [1.0, 0.0, 0.0, 0.0])])
                .await
                .unwrap();
        }

        let store = open_store(&temp_dir).await;
        store
            .upsert(&[create_test_record("b0", "b.txt", 0, [1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(&[create_test_record("c0", "c.txt", 0, [1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap();

        let snapshot = store.get_all(Include::IDS, None).await.unwrap();
        assert_eq!(snapshot.ids, vec!["a0", "b0", "c0"]);
    }
}
