//! Upload Log - rusqlite 기반 업로드 기록
//!
//! 수집 시도마다 한 행을 남깁니다 (성공/실패 모두).
//! 벡터 저장소와는 독립적이며, 기록 실패는 수집 결과에 영향을 주지 않습니다.
//! 저장 위치: `<data_dir>/uploads.db`

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 업로드 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Stored,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "stored" => Self::Stored,
            _ => Self::Failed,
        }
    }
}

/// 새 업로드 기록 입력
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub size_bytes: u64,
    pub status: UploadStatus,
    pub chunk_count: usize,
    pub message: String,
}

/// 저장된 업로드 기록
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadEntry {
    pub id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub size_bytes: u64,
    pub status: UploadStatus,
    pub chunk_count: usize,
    pub message: String,
    pub uploaded_at: DateTime<Utc>,
}

// ============================================================================
// UploadLog
// ============================================================================

/// 업로드 기록 저장소
pub struct UploadLog {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl UploadLog {
    /// 기록 DB 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open upload log database")?;

        let log = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        log.initialize()?;
        Ok(log)
    }

    /// 메모리 DB (테스트, 일회성 실행)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let log = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
        };
        log.initialize()?;
        Ok(log)
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS uploads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                message TEXT NOT NULL DEFAULT '',
                uploaded_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create uploads table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_uploads_file_name ON uploads(file_name)",
            [],
        )
        .context("Failed to create file_name index")?;

        tracing::debug!("Upload log initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 기록 추가
    pub fn record(&self, upload: &NewUpload) -> Result<i64> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO uploads
                (file_name, file_path, file_type, size_bytes, status, chunk_count, message, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                upload.file_name,
                upload.file_path,
                upload.file_type,
                upload.size_bytes as i64,
                upload.status.as_str(),
                upload.chunk_count as i64,
                upload.message,
                now,
            ],
        )
        .context("Failed to insert upload record")?;

        Ok(conn.last_insert_rowid())
    }

    /// 최근 기록 (최신순)
    pub fn recent(&self, limit: usize) -> Result<Vec<UploadEntry>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT id, file_name, file_path, file_type, size_bytes, status, chunk_count, message, uploaded_at
             FROM uploads ORDER BY id DESC LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit as i64], |row| {
                let status: String = row.get(5)?;
                Ok(UploadEntry {
                    id: row.get(0)?,
                    file_name: row.get(1)?,
                    file_path: row.get(2)?,
                    file_type: row.get(3)?,
                    size_bytes: row.get::<_, i64>(4)? as u64,
                    status: UploadStatus::parse(&status),
                    chunk_count: row.get::<_, i64>(6)? as usize,
                    message: row.get(7)?,
                    uploaded_at: parse_datetime(row.get(8)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read upload records")?;

        Ok(entries)
    }

    /// 전체 기록 수
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM uploads", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 전체 기록 삭제, 삭제된 행 수 반환
    pub fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let deleted = conn
            .execute("DELETE FROM uploads", [])
            .context("Failed to clear upload log")?;
        Ok(deleted)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================
