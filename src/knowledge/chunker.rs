//! Text Chunking Module
//!
//! 재귀 문자 분할을 제공합니다.
//! 문단 → 줄 → 단어 → 문자 순으로 큰 경계를 먼저 시도하고,
//! 조각들을 `chunk_size` 이하로 병합하면서 `chunk_overlap` 만큼 앞 청크의 꼬리를 이어 붙입니다.
//! 길이는 모두 문자(char) 단위입니다.

use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::error::SplitError;

/// 기본 분할 경계 (큰 구조 → 작은 구조)
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할 (순서 유지, 빈 입력이면 빈 벡터)
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 재귀 문자 청커
pub struct RecursiveChunker {
    config: ChunkingConfig,
    separators: Vec<&'static str>,
}

impl RecursiveChunker {
    /// 설정으로 생성 (검증 포함)
    pub fn new(config: ChunkingConfig) -> Result<Self, SplitError> {
        config.validate()?;
        Ok(Self {
            config,
            separators: DEFAULT_SEPARATORS.to_vec(),
        })
    }

    /// 기본 설정으로 생성 (200 / 100)
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkingConfig::default(),
            separators: DEFAULT_SEPARATORS.to_vec(),
        }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// 분할 경계를 골라 나누고, 너무 긴 조각은 다음 경계로 재귀 분할
    fn split_recursive(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        let mut chunks = Vec::new();

        // 텍스트에 존재하는 첫 번째 경계 선택
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&'static str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut good: Vec<&str> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                chunks.extend(self.merge_splits(&good));
                good.clear();
            }

            if remaining.is_empty() {
                let piece = piece.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge_splits(&good));
        }

        chunks
    }

    /// 작은 조각들을 chunk_size 이하로 병합 (오버랩 유지)
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > size && !current.is_empty() {
                if let Some(doc) = join_pieces(&current) {
                    docs.push(doc);
                }

                // 오버랩 이하가 될 때까지 앞 조각 제거
                while total > overlap || (total + len > size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_pieces(&current) {
            docs.push(doc);
        }

        docs
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let separators = self.separators.clone();
        self.split_recursive(text, &separators)
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 경계 문자열을 다음 조각의 앞에 붙여서 분할 (빈 조각 제외)
///
/// 경계가 빈 문자열이면 문자 단위로 나눕니다.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_pieces(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 설정을 지정한 청커 생성
pub fn recursive_chunker(config: ChunkingConfig) -> Result<Box<dyn Chunker>, SplitError> {
    Ok(Box::new(RecursiveChunker::new(config)?))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet_text(len: usize) -> String {
        (0..len)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect()
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn test_chunker_small_text() {
        let chunker = RecursiveChunker::with_defaults();
        let chunks = chunker.chunk("Short paragraph.\nSecond line.");
        assert_eq!(chunks, vec!["Short paragraph.\nSecond line.".to_string()]);
    }

    #[test]
    fn test_three_paragraphs_of_500_chars() {
        let text = format!(
            "{}\n\n{}\n\n{}",
            "a".repeat(166),
            "b".repeat(165),
            "c".repeat(165)
        );
        assert_eq!(text.chars().count(), 500);

        let chunks = RecursiveChunker::with_defaults().chunk(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "a".repeat(166));
        assert_eq!(chunks[1], "b".repeat(165));
        assert_eq!(chunks[2], "c".repeat(165));
    }

    #[test]
    fn test_character_fallback_has_exact_overlap() {
        let text = alphabet_text(500);
        let chunks = RecursiveChunker::with_defaults().chunk(&text);

        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert_eq!(chunk.chars().count(), 200);
        }
        for pair in chunks.windows(2) {
            assert_eq!(&pair[0][100..], &pair[1][..100]);
        }

        // 오버랩을 제거하고 이어 붙이면 원문
        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.push_str(&chunk[100..]);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_word_boundaries_preferred() {
        let text: Vec<String> = (0..60).map(|i| format!("word{:02}", i)).collect();
        let text = text.join(" ");
        let chunks = RecursiveChunker::with_defaults().chunk(&text);

        assert!(chunks.len() > 1);
        assert!(chunks[0].starts_with("word00"));
        assert!(chunks.last().unwrap().ends_with("word59"));

        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200);
            // 단어 중간에서 잘리지 않음
            for word in chunk.split(' ') {
                assert_eq!(word.len(), 6, "broken word: {:?}", word);
            }
        }

        // 다음 청크의 첫 단어는 이전 청크에 포함 (오버랩)
        for pair in chunks.windows(2) {
            let first_word = pair[1].split(' ').next().unwrap();
            assert!(pair[0].contains(first_word));
        }
    }

    #[test]
    fn test_multibyte_text() {
        let text = "안녕하세요 세계 ".repeat(40);
        let chunks = RecursiveChunker::with_defaults().chunk(&text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200);
        }
    }

    #[test]
    fn test_custom_config() {
        let chunker = RecursiveChunker::new(ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 0,
        })
        .unwrap();
        let chunks = chunker.chunk("aaaa bbbb cccc dddd");
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc dddd"]);
    }

    #[test]
    fn test_invalid_config() {
        let result = RecursiveChunker::new(ChunkingConfig {
            chunk_size: 50,
            chunk_overlap: 50,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_split_keep_separator() {
        assert_eq!(
            split_keep_separator("a\n\nb\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\nc"]
        );
        assert_eq!(split_keep_separator("ab", ""), vec!["a", "b"]);
        assert_eq!(split_keep_separator("\n\nx", "\n\n"), vec!["\n\nx"]);
    }
}
