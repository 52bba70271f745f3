//! Model registry, metadata and path resolution.
//!
//! [`WHISPER_MODELS`] lists the multilingual GGML models the transcriber
//! knows how to load.  [`ModelPaths`] resolves their on-disk location from
//! an [`crate::config::AppPaths`] instance.

use std::path::PathBuf;

use crate::config::AppPaths;

// ---------------------------------------------------------------------------
// ModelSize
// ---------------------------------------------------------------------------

/// Approximate capacity tier of a Whisper GGML model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelSize {
    /// ~75 MB file, fastest, lowest accuracy.
    Tiny,
    /// ~142 MB file, the default.
    Base,
    /// ~466 MB file.
    Small,
    /// ~1.5 GB file.
    Medium,
    /// ~3 GB file, highest accuracy, slowest.
    Large,
}

// ---------------------------------------------------------------------------
// ModelInfo
// ---------------------------------------------------------------------------

/// Static metadata for a single GGML model file.
#[derive(Debug)]
pub struct ModelInfo {
    /// Identifier used in `SttConfig::model` (e.g. `"base"`).
    pub id: &'static str,
    pub size: ModelSize,
    /// File name under the models directory.
    pub file_name: &'static str,
    pub file_size_mb: u64,
    pub source_url: &'static str,
}

/// Standard multilingual Whisper models (ggml conversions from whisper.cpp).
pub const WHISPER_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "tiny",
        size: ModelSize::Tiny,
        file_name: "ggml-tiny.bin",
        file_size_mb: 75,
        source_url: "https://huggingface.co/ggerganov/whisper.cpp",
    },
    ModelInfo {
        id: "base",
        size: ModelSize::Base,
        file_name: "ggml-base.bin",
        file_size_mb: 142,
        source_url: "https://huggingface.co/ggerganov/whisper.cpp",
    },
    ModelInfo {
        id: "small",
        size: ModelSize::Small,
        file_name: "ggml-small.bin",
        file_size_mb: 466,
        source_url: "https://huggingface.co/ggerganov/whisper.cpp",
    },
    ModelInfo {
        id: "medium",
        size: ModelSize::Medium,
        file_name: "ggml-medium.bin",
        file_size_mb: 1_500,
        source_url: "https://huggingface.co/ggerganov/whisper.cpp",
    },
    ModelInfo {
        id: "large-v3",
        size: ModelSize::Large,
        file_name: "ggml-large-v3.bin",
        file_size_mb: 3_100,
        source_url: "https://huggingface.co/ggerganov/whisper.cpp",
    },
];

/// Find a [`ModelInfo`] by its `id` string.
pub fn find_model_by_id(id: &str) -> Option<&'static ModelInfo> {
    WHISPER_MODELS.iter().find(|m| m.id == id)
}

// ---------------------------------------------------------------------------
// ModelPaths
// ---------------------------------------------------------------------------

/// Resolves the on-disk location of model files.
///
/// ```rust,no_run
/// use sound_filter::config::AppPaths;
/// use sound_filter::stt::{ModelPaths, WHISPER_MODELS};
///
/// let paths = ModelPaths::from_app_paths(&AppPaths::new());
/// let available: Vec<_> = WHISPER_MODELS.iter()
///     .filter(|m| paths.is_available(m))
///     .collect();
/// ```
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub models_dir: PathBuf,
}

impl ModelPaths {
    pub fn from_app_paths(app_paths: &AppPaths) -> Self {
        Self {
            models_dir: app_paths.models_dir.clone(),
        }
    }

    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn model_path(&self, model: &ModelInfo) -> PathBuf {
        self.models_dir.join(model.file_name)
    }

    pub fn is_available(&self, model: &ModelInfo) -> bool {
        self.model_path(model).exists()
    }

    /// Resolve a configured model: a registry id, or a path to a GGML file.
    pub fn resolve(&self, model: &str) -> PathBuf {
        match find_model_by_id(model) {
            Some(info) => self.model_path(info),
            None => PathBuf::from(model),
        }
    }

    pub fn list_local_models(&self) -> Vec<&'static ModelInfo> {
        WHISPER_MODELS
            .iter()
            .filter(|m| self.is_available(m))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
