//! 설정 모듈
//!
//! 기본값 → TOML 파일(`<data_dir>/kbase.toml`) → 환경변수 → CLI 플래그 순으로
//! 덮어씁니다. 모든 필드는 기본값을 가지므로 설정 파일은 선택 사항입니다.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KbError, SplitError};

/// 설정 파일 이름
pub const CONFIG_FILE_NAME: &str = "kbase.toml";

/// 기본 컬렉션 이름
pub const DEFAULT_COLLECTION: &str = "knowledge_base";

/// 기본 임베딩 모델
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// 데이터 디렉토리 경로 (~/.kbase/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kbase")
}

// ============================================================================
// Config Types
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KbConfig {
    /// 데이터 루트 디렉토리 (설정 파일이 아니라 CLI/환경변수로 결정)
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// 업로드 파일 저장 디렉토리 (없으면 `<data_dir>/files`)
    pub files_dir: Option<PathBuf>,
    /// LanceDB 디렉토리 (없으면 `<data_dir>/index.lance`)
    pub index_dir: Option<PathBuf>,
    /// 업로드 기록 DB (없으면 `<data_dir>/uploads.db`)
    pub log_path: Option<PathBuf>,
    /// 벡터 컬렉션(테이블) 이름
    pub collection: String,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub ingest: IngestConfig,
    pub search: SearchConfig,
}

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 간 오버랩 (문자 수)
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    /// 설정 검증
    pub fn validate(&self) -> Result<(), SplitError> {
        if self.chunk_size == 0 {
            return Err(SplitError::ZeroChunkSize);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(SplitError::OverlapTooLarge {
                size: self.chunk_size,
                overlap: self.chunk_overlap,
            });
        }
        Ok(())
    }
}

/// 임베딩 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// 사용할 모델 이름
    pub model: String,
    /// 모델 로드 실패 시 폴백 모델
    pub fallback_model: String,
    /// 모델 캐시 디렉토리
    pub cache_dir: Option<PathBuf>,
    /// 추론 배치 크기 (없으면 엔진 기본값)
    pub batch_size: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            fallback_model: DEFAULT_MODEL.to_string(),
            cache_dir: None,
            batch_size: None,
        }
    }
}

/// 같은 이름의 파일을 다시 수집할 때의 동작
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReingestPolicy {
    /// 기존 레코드를 유지하고 새 레코드를 추가
    #[default]
    Append,
    /// 같은 file_name의 기존 레코드를 삭제한 뒤 추가
    Replace,
}

/// 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub reingest: ReingestPolicy,
    /// 엑셀 통합 문서 단위 로더를 먼저 시도할지 여부
    pub prefer_table_excel: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            reingest: ReingestPolicy::Append,
            prefer_table_excel: true,
        }
    }
}

/// 검색 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 20,
        }
    }
}

impl SearchConfig {
    /// 1 <= default_top_k <= max_top_k
    pub fn validate(&self) -> Result<(), KbError> {
        if self.default_top_k == 0 || self.default_top_k > self.max_top_k {
            return Err(KbError::Config(format!(
                "search.default_top_k must be between 1 and max_top_k ({}), got {}",
                self.max_top_k, self.default_top_k
            )));
        }
        Ok(())
    }
}

impl Default for KbConfig {
    fn default() -> Self {
        Self::with_data_dir(get_data_dir())
    }
}

// ============================================================================
// Loading
// ============================================================================

impl KbConfig {
    /// 데이터 디렉토리를 지정한 기본 설정
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            files_dir: None,
            index_dir: None,
            log_path: None,
            collection: DEFAULT_COLLECTION.to_string(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            ingest: IngestConfig::default(),
            search: SearchConfig::default(),
        }
    }

    /// TOML 문자열 파싱
    pub fn from_toml_str(s: &str) -> Result<Self, KbError> {
        toml::from_str(s).map_err(|e| KbError::Config(e.to_string()))
    }

    /// 설정 로드
    ///
    /// `explicit`가 있으면 그 파일을, 없으면 `<data_dir>/kbase.toml`이 있을 때만 읽습니다.
    /// 이후 `KBASE_DATA_DIR`, `KBASE_EMBED_MODEL` 환경변수를 적용합니다.
    pub fn load(data_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Self, KbError> {
        let data_dir = data_dir
            .map(Path::to_path_buf)
            .or_else(|| env_non_empty("KBASE_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(get_data_dir);

        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            tracing::debug!("Loaded config from {:?}", path);
            let mut config = Self::from_toml_str(&raw)?;
            config.data_dir = data_dir;
            config
        } else if explicit.is_some() {
            return Err(KbError::Config(format!("config file not found: {:?}", path)));
        } else {
            Self::with_data_dir(data_dir)
        };

        if let Some(model) = env_non_empty("KBASE_EMBED_MODEL") {
            config.embedding.model = model;
        }

        config.chunking.validate()?;
        config.search.validate()?;
        Ok(config)
    }

    pub fn files_dir(&self) -> PathBuf {
        self.files_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("files"))
    }

    pub fn index_dir(&self) -> PathBuf {
        self.index_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("index.lance"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("uploads.db"))
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Tests
// ============================================================================
