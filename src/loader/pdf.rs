//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::LoadError;

/// PDF에서 페이지별 텍스트 추출
///
/// (페이지 번호, 텍스트) 튜플 벡터를 반환합니다. 페이지 번호는 1부터 시작합니다.
/// 스캔 문서처럼 텍스트가 없으면 빈 벡터입니다.
pub fn extract_pages(path: &Path) -> Result<Vec<(usize, String)>, LoadError> {
    let bytes = super::read_bytes(path)?;

    let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| LoadError::parse(path, e))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(split_pages(&text))
}

/// 페이지 구분 줄 패턴 (`--- Page 3 ---`, `=== 3 ===`)
fn page_marker() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| Regex::new(r"(?m)^\s*[-=]+\s*(?:Page\s*)?\d+\s*[-=]+\s*$").ok())
        .as_ref()
}

/// PDF 텍스트를 (페이지 번호, 텍스트)로 분리
///
/// 폼피드(`\x0c`)를 먼저 쓰고, 없으면 구분 줄을 찾습니다.
/// 번호는 빈 페이지를 거르기 전에 매기므로 빈 페이지 뒤에도 원래 번호가 유지됩니다.
fn split_pages(text: &str) -> Vec<(usize, String)> {
    let pages = number_pages(text.split('\x0c'));
    if pages.len() > 1 {
        return pages;
    }

    if let Some(marker) = page_marker() {
        let pages = number_pages(marker.split(text));
        if pages.len() > 1 {
            return pages;
        }
    }

    vec![(1, text.trim().to_string())]
}

fn number_pages<'a>(pieces: impl Iterator<Item = &'a str>) -> Vec<(usize, String)> {
    pieces
        .enumerate()
        .map(|(i, s)| (i + 1, s.trim().to_string()))
        .filter(|(_, s)| !s.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
