//! Excel(.xlsx) 로더
//!
//! 두 가지 전략:
//! 1. 통합 문서 전체를 문서 하나로 (시트마다 이름 줄 + 탭으로 이은 행).
//!    한 시트라도 읽지 못하면 실패합니다.
//! 2. 폴백: 읽을 수 있는 시트마다 문서 하나.
//!    `Sheet:` / `Columns:` / `Row{n}:` 형식으로, 빈 셀은 생략합니다.

use std::path::Path;

use calamine::{open_workbook, Data, Range, Reader, Xlsx};

use crate::error::LoadError;

use super::Document;

/// 통합 문서 로드
pub fn load_workbook(path: &Path, prefer_table: bool) -> Result<Vec<Document>, LoadError> {
    if prefer_table {
        match load_whole_workbook(path) {
            Ok(document) => return Ok(vec![document]),
            Err(e) => {
                tracing::warn!(
                    "Workbook loader failed for {:?}: {}, trying per-sheet loader",
                    path,
                    e
                );
            }
        }
    }

    load_sheets(path)
}

/// 전략 1: 통합 문서 전체
fn load_whole_workbook(path: &Path) -> Result<Document, LoadError> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| LoadError::parse(path, e))?;
    let names = workbook.sheet_names().to_owned();

    let mut sections = Vec::with_capacity(names.len());
    for name in &names {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| LoadError::parse(path, format!("sheet '{}': {}", name, e)))?;

        let rows: Vec<String> = range
            .rows()
            .filter(|row| row.iter().any(|c| !is_blank(c)))
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>().join("\t"))
            .collect();

        let mut section = name.clone();
        for row in rows {
            section.push('\n');
            section.push_str(&row);
        }
        sections.push(section);
    }

    Ok(Document::new(path, sections.join("\n\n")))
}

/// 전략 2: 시트별 문서 (읽지 못한 시트는 건너뜀)
fn load_sheets(path: &Path) -> Result<Vec<Document>, LoadError> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| LoadError::parse(path, e))?;
    let names = workbook.sheet_names().to_owned();

    let mut documents = Vec::with_capacity(names.len());
    for name in names {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!("Skipping sheet '{}' in {:?}: {}", name, path, e);
                continue;
            }
        };

        let mut document = Document::new(path, render_sheet(&name, &range_to_rows(&range)));
        document.source.sheet_name = Some(name);
        documents.push(document);
    }

    Ok(documents)
}

fn range_to_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect()
}

/// 시트 → 텍스트
///
/// 첫 행은 헤더입니다 (빈 헤더는 `Unnamed: {i}`). 데이터 행이 없으면 시트 이름 줄만 남습니다.
pub fn render_sheet(name: &str, rows: &[Vec<String>]) -> String {
    let mut text = format!("Sheet: {}\n\n", name);

    let Some((header, data)) = rows.split_first() else {
        return text;
    };

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let columns: Vec<String> = (0..width)
        .map(|i| match header.get(i).map(|h| h.trim()) {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => format!("Unnamed: {}", i),
        })
        .collect();

    if data.is_empty() {
        return text;
    }

    text.push_str(&format!("Columns: {}\n\n", columns.join(", ")));

    for (index, row) in data.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(i, value)| format!("{}: {}", columns[i], value))
            .collect();

        if !cells.is_empty() {
            text.push_str(&format!("Row{}: {}\n", index + 1, cells.join(" | ")));
        }
    }

    text
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_render_sheet() {
        let text = render_sheet(
            "Prices",
            &rows(&[
                &["item", "price", ""],
                &["apple", "1.5", "fresh"],
                &["pear", "", ""],
                &["", "", ""],
                &["plum", "2", ""],
            ]),
        );

        assert_eq!(
            text,
            "Sheet: Prices\n\n\
             Columns: item, price, Unnamed: 2\n\n\
             Row1: item: apple | price: 1.5 | Unnamed: 2: fresh\n\
             Row2: item: pear\n\
             Row4: item: plum | price: 2\n"
        );
    }

    #[test]
    fn test_render_header_only_sheet() {
        assert_eq!(render_sheet("Empty", &rows(&[&["a", "b"]])), "Sheet: Empty\n\n");
        assert_eq!(render_sheet("None", &[]), "Sheet: None\n\n");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("x".into())), "x");
        assert_eq!(cell_text(&Data::Int(3)), "3");
        assert!(is_blank(&Data::String("  ".into())));
        assert!(!is_blank(&Data::Bool(false)));
    }

    #[test]
    fn test_invalid_workbook() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();

        assert!(matches!(load_workbook(&path, true), Err(LoadError::Parse { .. })));
        assert!(matches!(load_workbook(&path, false), Err(LoadError::Parse { .. })));
    }
}
