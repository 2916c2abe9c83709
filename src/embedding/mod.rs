//! 임베딩 모듈 - 로컬 CPU 텍스트 벡터화
//!
//! fastembed(ONNX Runtime)로 사전학습 문장 임베딩 모델을 CPU에서 실행합니다.
//! 같은 모델과 같은 입력이면 같은 벡터가 나옵니다.
//!
//! 모델 선택은 두 단계입니다: 설정된 모델을 먼저 시도하고,
//! 실패하면 기본 모델로 폴백합니다. 두 단계의 실패는 서로 다른 에러로 구분됩니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = FastEmbedProvider::load(&config.embedding).await?;
//! let vectors = embedder.embed_batch(&chunks).await?;
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::config::EmbeddingConfig;
use crate::error::EmbedError;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
/// 출력 벡터 수와 순서는 입력과 같아야 합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 배치 임베딩
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// 단일 텍스트 임베딩 (기본 구현: 크기 1 배치)
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            _ => Err(EmbedError::CountMismatch {
                expected: 1,
                actual: vectors.len() + 1,
            }),
        }
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

/// 배치 결과 검증: 개수와 차원
pub(crate) fn check_batch(
    vectors: &[Vec<f32>],
    expected: usize,
    dimension: usize,
) -> Result<(), EmbedError> {
    if vectors.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(EmbedError::Encode(format!(
            "expected {}-dimensional vectors, got {}",
            dimension,
            bad.len()
        )));
    }
    Ok(())
}

// ============================================================================
// FastEmbed Provider
// ============================================================================

/// fastembed 기반 로컬 임베딩
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimension: usize,
    batch_size: Option<usize>,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// 설정된 모델 로드, 실패 시 기본 모델로 폴백
    ///
    /// - 설정 모델을 찾지 못하면 경고를 남기고 `fallback_model`을 시도
    /// - 폴백까지 실패하면 `EmbedError::FallbackUnavailable`
    pub async fn load(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let requested = config.model.trim();

        match Self::load_named(requested, config).await {
            Ok(provider) => Ok(provider),
            Err(e) if requested == config.fallback_model => Err(e),
            Err(e) => {
                tracing::warn!(
                    "Embedding model '{}' unavailable ({}), falling back to '{}'",
                    requested,
                    e,
                    config.fallback_model
                );
                Self::load_named(&config.fallback_model, config)
                    .await
                    .map_err(|fallback_err| EmbedError::FallbackUnavailable {
                        requested: requested.to_string(),
                        fallback: config.fallback_model.clone(),
                        message: fallback_err.to_string(),
                    })
            }
        }
    }

    /// 이름으로 모델 하나를 로드 (폴백 없음)
    pub async fn load_named(name: &str, config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let (model, dimension) = resolve_model(name)?;
        let cache_dir: Option<PathBuf> = config.cache_dir.clone();
        let model_name = name.to_string();

        tracing::info!("Loading embedding model: {} ({} dims)", model_name, dimension);

        // 모델 다운로드/로드는 블로킹 작업
        let load_name = model_name.clone();
        let engine = tokio::task::spawn_blocking(move || -> Result<TextEmbedding, EmbedError> {
            let mut options = InitOptions::new(model).with_show_download_progress(false);
            if let Some(dir) = cache_dir {
                options = options.with_cache_dir(dir);
            }
            TextEmbedding::try_new(options).map_err(|e| EmbedError::ModelLoad {
                name: load_name,
                message: e.to_string(),
            })
        })
        .await??;

        tracing::info!("Embedding model loaded: {}", model_name);

        Ok(Self {
            model: Arc::new(Mutex::new(engine)),
            model_name,
            dimension,
            batch_size: config.batch_size,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Embedding {} texts with {}", texts.len(), self.model_name);

        let model = Arc::clone(&self.model);
        let inputs = texts.to_vec();
        let batch_size = self.batch_size;

        let vectors = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>, EmbedError> {
            let mut engine = model
                .lock()
                .map_err(|e| EmbedError::Encode(format!("Lock error: {}", e)))?;
            engine
                .embed(inputs, batch_size)
                .map_err(|e| EmbedError::Encode(e.to_string()))
        })
        .await??;

        check_batch(&vectors, texts.len(), self.dimension)?;
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// 모델 이름 → fastembed 모델과 차원
///
/// `Qdrant/all-MiniLM-L6-v2-onnx` 같은 전체 코드와
/// `all-MiniLM-L6-v2` 같은 짧은 이름을 모두 받습니다 (대소문자 무시).
pub fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize), EmbedError> {
    let wanted = normalize_model_name(name);
    if wanted.is_empty() {
        return Err(EmbedError::ModelNotFound {
            name: name.to_string(),
        });
    }

    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| {
            info.model_code.eq_ignore_ascii_case(name.trim())
                || normalize_model_name(&info.model_code) == wanted
        })
        .map(|info| (info.model, info.dim))
        .ok_or_else(|| EmbedError::ModelNotFound {
            name: name.to_string(),
        })
}

/// 조직 접두사와 `-onnx` 접미사를 제거한 소문자 이름
fn normalize_model_name(name: &str) -> String {
    let short = name.trim().rsplit('/').next().unwrap_or("").to_lowercase();
    short
        .strip_suffix("-onnx")
        .map(str::to_string)
        .unwrap_or(short)
}

// ============================================================================
// Hash Embedding
// ============================================================================

/// 결정적 해싱 임베딩 (테스트용)
///
/// 단어를 해시 버킷에 누적한 뒤 L2 정규화합니다. 모델 다운로드 없이
/// 파이프라인을 돌릴 수 있고, 같은 단어를 공유하는 텍스트끼리
/// 코사인 유사도가 높습니다.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimension: usize,
}

#[cfg(test)]
impl HashEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[cfg(test)]
#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// FNV-1a 64bit
#[cfg(test)]
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// 항상 실패하는 임베딩 (실패 경로 테스트용)
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingEmbedding;

#[cfg(test)]
#[async_trait]
impl EmbeddingProvider for FailingEmbedding {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Encode("simulated encoder failure".to_string()))
    }

    fn dimension(&self) -> usize {
        8
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// ============================================================================
// Tests
// ============================================================================
