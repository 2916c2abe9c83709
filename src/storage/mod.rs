//! 파일 저장소 모듈
//!
//! 업로드된 파일을 고정 디렉토리에 원래 이름 그대로 복사해 둡니다.
//! 같은 이름이면 덮어씁니다. 하위 디렉토리는 만들지 않습니다.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{KbError, Result, ValidationError};

// ============================================================================
// Stored File
// ============================================================================

/// 저장된 파일 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub path: PathBuf,
    /// 파일 크기 (바이트)
    pub size: u64,
}

// ============================================================================
// FileStore
// ============================================================================

/// 업로드 파일 디렉토리
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// 저장소 열기 (디렉토리가 없으면 생성)
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 이름에 해당하는 저장 경로 (이름 검증 포함)
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_file_name(name)?;
        Ok(self.root.join(name))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path_of(name)?.is_file())
    }

    /// 원본 파일을 같은 이름으로 복사
    pub fn save(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ValidationError::InvalidFileName(source.display().to_string()))?;
        self.save_as(source, name)
    }

    /// 원본 파일을 지정한 이름으로 복사 (덮어쓰기)
    pub fn save_as(&self, source: &Path, name: &str) -> Result<PathBuf> {
        let dest = self.path_of(name)?;

        // 이미 저장소 안의 파일이면 복사하지 않음
        if same_file(source, &dest) {
            return Ok(dest);
        }

        std::fs::copy(source, &dest)?;
        tracing::debug!("Stored {:?} as {:?}", source, dest);
        Ok(dest)
    }

    /// 바이트를 파일로 저장 (덮어쓰기)
    pub fn save_bytes(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dest = self.path_of(name)?;
        std::fs::write(&dest, bytes)?;
        Ok(dest)
    }

    /// 저장된 파일 목록 (이름순)
    pub fn list(&self) -> Result<Vec<StoredFile>> {
        if !self.root.exists() {
            return Ok(vec![]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| KbError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let size = entry.metadata().map_err(|e| KbError::Io(e.into()))?.len();
            files.push(StoredFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().to_path_buf(),
                size,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// 파일 삭제. 없으면 `false`
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// 모든 파일 삭제, 삭제된 개수 반환
    pub fn clear(&self) -> Result<usize> {
        let files = self.list()?;
        for file in &files {
            std::fs::remove_file(&file.path)?;
        }
        Ok(files.len())
    }

    /// 전체 크기 (바이트)
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.list()?.iter().map(|f| f.size).sum())
    }
}

/// 저장소 파일 이름 검증 (경로 구분자, 상위 디렉토리 참조 금지)
pub fn validate_file_name(name: &str) -> std::result::Result<(), ValidationError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(ValidationError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("files")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_save_and_list() {
        let (dir, store) = create_store();
        let source = dir.path().join("b.txt");
        std::fs::write(&source, "hello").unwrap();

        let dest = store.save(&source).unwrap();
        assert_eq!(dest, store.root().join("b.txt"));
        store.save_bytes("a.md", b"# title").unwrap();

        let files = store.list().unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
        assert_eq!(files[1].size, 5);
        assert_eq!(store.total_size().unwrap(), 12);
    }

    #[test]
    fn test_save_overwrites() {
        let (dir, store) = create_store();
        let source = dir.path().join("a.txt");

        std::fs::write(&source, "first").unwrap();
        store.save(&source).unwrap();
        std::fs::write(&source, "second version").unwrap();
        let dest = store.save(&source).unwrap();

        assert_eq!(std::fs::read_to_string(dest).unwrap(), "second version");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_save_from_inside_store() {
        let (_dir, store) = create_store();
        let path = store.save_bytes("a.txt", b"x").unwrap();
        assert_eq!(store.save(&path).unwrap(), path);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x");
    }

    #[test]
    fn test_remove_and_clear() {
        let (_dir, store) = create_store();
        store.save_bytes("a.txt", b"1").unwrap();
        store.save_bytes("b.txt", b"2").unwrap();

        assert!(store.remove("a.txt").unwrap());
        assert!(!store.remove("a.txt").unwrap());
        assert!(!store.exists("a.txt").unwrap());

        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_names() {
        let (_dir, store) = create_store();
        for name in ["", "..", "../x.txt", "a/b.txt", "a\\b.txt"] {
            assert!(store.path_of(name).is_err(), "accepted {:?}", name);
        }
        assert!(validate_file_name("보고서 2024.pdf").is_ok());
    }
}
