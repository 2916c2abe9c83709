//! Word(.docx) 텍스트 추출
//!
//! docx는 zip 컨테이너이고 본문은 `word/document.xml`에 있습니다.
//! 문단(`w:p`)은 줄바꿈, 탭(`w:tab`)은 탭, 줄 나눔(`w:br`)은 줄바꿈으로 옮기고
//! 텍스트 런(`w:t`)의 내용만 이어 붙입니다.

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::LoadError;

const DOCUMENT_XML: &str = "word/document.xml";

/// docx 본문 텍스트 추출
pub fn extract_text(path: &Path) -> Result<String, LoadError> {
    let bytes = super::read_bytes(path)?;

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| LoadError::parse(path, e))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| LoadError::parse(path, format!("{}: {}", DOCUMENT_XML, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| LoadError::parse(path, e))?;

    document_xml_to_text(&xml).map_err(|e| LoadError::parse(path, e))
}

/// 텍스트 런과 구조 태그 패턴 (한 번만 컴파일)
fn token_pattern() -> Result<&'static Regex, regex::Error> {
    static TOKEN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    TOKEN
        .get_or_init(|| {
            Regex::new(
                r"(?s)<w:t(?:\s[^>]*)?/>|<w:t(?:\s[^>]*)?>(?P<text>.*?)</w:t>|<w:tab\s*/>|<w:br\s*/>|<w:cr\s*/>|</w:p>",
            )
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// document.xml → 평문
pub fn document_xml_to_text(xml: &str) -> Result<String, regex::Error> {
    let token = token_pattern()?;

    let mut out = String::new();
    for caps in token.captures_iter(xml) {
        if let Some(text) = caps.name("text") {
            out.push_str(&unescape_xml(text.as_str()));
            continue;
        }

        let tag = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if tag.starts_with("<w:tab") {
            out.push('\t');
        } else if tag.starts_with("<w:br") || tag.starts_with("<w:cr") || tag == "</w:p>" {
            out.push('\n');
        }
    }

    Ok(out.trim_end().to_string())
}

/// XML 기본 엔티티와 숫자 문자 참조 해제
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let Some(end) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Quarterly</w:t></w:r><w:r><w:t xml:space="preserve"> report</w:t></w:r></w:p>
<w:p><w:r><w:t>A</w:t><w:tab/><w:t>B &amp; C</w:t><w:br/><w:t>&#50504;&#xB155;</w:t></w:r></w:p>
</w:body></w:document>"#;

    #[test]
    fn test_document_xml_to_text() {
        let text = document_xml_to_text(BODY).unwrap();
        assert_eq!(text, "Quarterly report\nA\tB & C\n안녕");
    }

    #[test]
    fn test_token_pattern_compiled_once() {
        let first = token_pattern().unwrap();
        let second = token_pattern().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &lt;b&gt; &quot;c&quot;"), "a <b> \"c\"");
        assert_eq!(unescape_xml("AT&T"), "AT&T");
        assert_eq!(unescape_xml("x &unknown; y"), "x &unknown; y");
    }

    #[test]
    fn test_extract_text_from_docx_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(DOCUMENT_XML, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(BODY.as_bytes()).unwrap();
        zip.finish().unwrap();

        let text = extract_text(&path).unwrap();
        assert!(text.starts_with("Quarterly report"));
    }

    #[test]
    fn test_zip_without_body() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        zip.finish().unwrap();

        assert!(matches!(extract_text(&path), Err(LoadError::Parse { .. })));
    }
}
