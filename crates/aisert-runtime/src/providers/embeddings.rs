//! Local sentence embeddings with fastembed (ONNX).

use aisert_core::{BackendError, Embedder, EmbedderFactory, ValidationContext};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use std::sync::Arc;

/// Supported model names. Hub prefixes are accepted as well.
const MODELS: [(&str, EmbeddingModel); 7] = [
    ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2),
    ("all-MiniLM-L12-v2", EmbeddingModel::AllMiniLML12V2),
    ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15),
    ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15),
    ("bge-large-en-v1.5", EmbeddingModel::BGELargeENV15),
    ("nomic-embed-text-v1.5", EmbeddingModel::NomicEmbedTextV15),
    ("paraphrase-multilingual-MiniLM-L12-v2", EmbeddingModel::ParaphraseMLMiniLML12V2),
];

const HUB_PREFIXES: [&str; 4] = ["sentence-transformers/", "BAAI/", "nomic-ai/", "Qdrant/"];

/// Map a configured model name to a fastembed model.
pub fn embedding_model(name: &str) -> Result<EmbeddingModel, BackendError> {
    let short = HUB_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name);

    MODELS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(short))
        .map(|(_, model)| model.clone())
        .ok_or_else(|| {
            BackendError::UnsupportedModel(format!(
                "Unsupported sentence transformer model '{name}'. Supported: {:?}",
                supported_models()
            ))
        })
}

pub fn supported_models() -> Vec<&'static str> {
    MODELS.iter().map(|(name, _)| *name).collect()
}

/// A loaded fastembed model.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    name: String,
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FastEmbedder {
    /// Load (downloading on first use) the named model.
    pub fn load(name: &str) -> Result<Self, BackendError> {
        let model = embedding_model(name)?;
        tracing::info!(model = %name, "loading embedding model");

        let options = InitOptions::new(model).with_show_download_progress(false);
        let embedding = TextEmbedding::try_new(options)
            .map_err(|e| BackendError::ModelLoad(format!("Failed to load model '{name}': {e}")))?;

        Ok(Self {
            model: Mutex::new(embedding),
            name: name.to_string(),
        })
    }
}

impl Embedder for FastEmbedder {
    fn encode(&self, text: &str, _ctx: &ValidationContext) -> Result<Vec<f32>, BackendError> {
        let embeddings = self
            .model
            .lock()
            .embed(vec![text], None)
            .map_err(|e| BackendError::Inference(format!("Embedding failed: {e}")))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Inference("Embedding returned no vectors".to_string()))
    }

    fn model(&self) -> &str {
        &self.name
    }
}

/// Creates [`FastEmbedder`]s.
#[derive(Debug, Default)]
pub struct FastEmbedFactory;

impl EmbedderFactory for FastEmbedFactory {
    fn create(&self, model: &str) -> Result<Arc<dyn Embedder>, BackendError> {
        Ok(Arc::new(FastEmbedder::load(model)?))
    }

    fn description(&self) -> &'static str {
        "fastembed ONNX sentence embeddings"
    }
}
