//! 문서 로더 모듈
//!
//! 파일을 선언된 타입에 따라 하나 이상의 텍스트 문서로 변환합니다.
//! 타입은 내용을 보고 추측하지 않고, 호출자가 준 MIME 타입/확장자 태그로 결정합니다.
//! - 텍스트/Markdown: UTF-8로 직접 읽기
//! - PDF: 페이지마다 문서 하나
//! - Word (.docx): 본문 전체를 문서 하나로
//! - Excel (.xlsx): 통합 문서 전체, 실패 시 시트마다 문서 하나

pub mod docx;
pub mod pdf;
pub mod xlsx;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// ============================================================================
// Document
// ============================================================================

/// 로드된 텍스트 단위
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub source: SourceMetadata,
}

/// 문서 출처 정보
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMetadata {
    pub file_path: String,
    /// 엑셀 시트 이름
    pub sheet_name: Option<String>,
    /// PDF 페이지 번호 (1부터 시작)
    pub page: Option<usize>,
}

impl Document {
    fn new(path: &Path, text: String) -> Self {
        Self {
            text,
            source: SourceMetadata {
                file_path: path.display().to_string(),
                ..Default::default()
            },
        }
    }
}

// ============================================================================
// File Kind
// ============================================================================

/// 지원 파일 타입 (닫힌 집합 + 미인식)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Markdown,
    Pdf,
    Docx,
    Xlsx,
    /// 인식하지 못한 타입 태그
    Unrecognized(String),
}

impl FileKind {
    /// 선언된 타입 태그 (확장자 또는 MIME 타입)
    pub fn from_declared(tag: &str) -> Self {
        let tag = tag.trim();
        match tag {
            "txt" | "text" | "text/plain" => Self::Text,
            "md" | "markdown" | "text/markdown" => Self::Markdown,
            "pdf" | "PDF" | "application/pdf" => Self::Pdf,
            "docx" | DOCX_MIME => Self::Docx,
            "xlsx" | XLSX_MIME => Self::Xlsx,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// 파일 확장자로 추정 (CLI에서 `--type`이 없을 때)
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        Self::from_declared(&ext)
    }

    /// 정규화된 타입 태그
    pub fn tag(&self) -> &str {
        match self {
            Self::Text => "txt",
            Self::Markdown => "md",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Unrecognized(tag) => tag,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// Loading
// ============================================================================

/// 파일을 문서로 로드
///
/// 빈 문서는 버립니다. 남는 문서가 없으면 `LoadError::Empty`.
///
/// # Arguments
/// * `path` - 파일 경로
/// * `declared_type` - 확장자 또는 MIME 타입
/// * `prefer_table_excel` - 엑셀을 통합 문서 단위로 먼저 읽을지 여부
pub async fn load_document(
    path: &Path,
    declared_type: &str,
    prefer_table_excel: bool,
) -> Result<Vec<Document>, LoadError> {
    let kind = FileKind::from_declared(declared_type);
    if let FileKind::Unrecognized(tag) = &kind {
        return Err(LoadError::Unsupported(tag.clone()));
    }

    // 파싱은 CPU 바운드이므로 spawn_blocking 사용
    let owned: PathBuf = path.to_path_buf();
    let documents =
        tokio::task::spawn_blocking(move || load_sync(&owned, &kind, prefer_table_excel))
            .await
            .map_err(|e| LoadError::parse(path, format!("loader task failed: {}", e)))??;

    let documents: Vec<Document> = documents
        .into_iter()
        .filter(|d| !d.text.trim().is_empty())
        .collect();

    if documents.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }

    tracing::debug!("Loaded {} documents from {:?}", documents.len(), path);
    Ok(documents)
}

fn load_sync(
    path: &Path,
    kind: &FileKind,
    prefer_table_excel: bool,
) -> Result<Vec<Document>, LoadError> {
    match kind {
        FileKind::Text | FileKind::Markdown => load_text(path),
        FileKind::Pdf => Ok(pdf::extract_pages(path)?
            .into_iter()
            .map(|(page, text)| {
                let mut doc = Document::new(path, text);
                doc.source.page = Some(page);
                doc
            })
            .collect()),
        FileKind::Docx => Ok(vec![Document::new(path, docx::extract_text(path)?)]),
        FileKind::Xlsx => xlsx::load_workbook(path, prefer_table_excel),
        FileKind::Unrecognized(tag) => Err(LoadError::Unsupported(tag.clone())),
    }
}

/// 텍스트 파일 (UTF-8)
fn load_text(path: &Path) -> Result<Vec<Document>, LoadError> {
    let bytes = read_bytes(path)?;
    let text = String::from_utf8(bytes).map_err(|e| LoadError::parse(path, e))?;
    Ok(vec![Document::new(path, text)])
}

/// 파일 읽기 (경로를 담은 에러)
pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Tests
// ============================================================================
