//! Request parameter set, defaults, and validation.
//!
//! [`GenerationRequest`] is the caller-facing contract: one face image
//! plus a small set of generation knobs. Everything is validated here,
//! before any field reaches the workflow binder.

use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults and limits
// ---------------------------------------------------------------------------

/// Default positive prompt when the caller supplies none.
pub const DEFAULT_PROMPT: &str = "A photo of a person";

/// Default output canvas edge length in pixels.
pub const DEFAULT_DIMENSION: u32 = 1024;

/// Default re-encode quality.
pub const DEFAULT_OUTPUT_QUALITY: u8 = 80;

/// Smallest allowed batch size.
pub const MIN_BATCH_SIZE: u32 = 1;

/// Largest allowed batch size.
pub const MAX_BATCH_SIZE: u32 = 10;

/// Largest allowed output quality value.
pub const MAX_OUTPUT_QUALITY: u8 = 100;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How strongly the generated faces should resemble the input face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaceStyle {
    /// Prioritize likeness to the source face.
    HighFidelity,
    /// Let the prompt's style dominate over likeness.
    Stylized,
}

impl FaceStyle {
    /// The method token the face-swap node understands.
    pub fn method_token(self) -> &'static str {
        match self {
            Self::HighFidelity => "fidelity",
            Self::Stylized => "style",
        }
    }
}

/// Encoding format for returned artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Jpg,
    Png,
}

impl OutputFormat {
    /// File suffix for this format, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }

    /// Whether the format applies lossy compression.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Webp | Self::Jpg)
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One generation request. Deserializable from a caller-supplied JSON
/// document; absent fields take the documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Path to the source face photograph. Required.
    pub face_image: PathBuf,

    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// User-supplied negative prompt. The binder always prepends the
    /// fixed denylist prefix regardless of this value.
    #[serde(default)]
    pub negative_prompt: String,

    #[serde(default = "default_dimension")]
    pub width: u32,

    #[serde(default = "default_dimension")]
    pub height: u32,

    /// Catalog identifier of the checkpoint to use. `None` selects the
    /// catalog's first entry.
    #[serde(default)]
    pub checkpoint_model: Option<String>,

    #[serde(default = "default_face_style")]
    pub face_style: FaceStyle,

    /// Batch size presented to the backend, in
    /// [`MIN_BATCH_SIZE`]..=[`MAX_BATCH_SIZE`]. Never silently clamped.
    #[serde(default = "default_batch_size")]
    pub number_of_images: u32,

    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,

    #[serde(default = "default_output_quality")]
    pub output_quality: u8,

    /// Sampler seed. `None` draws a random seed, which is logged so the
    /// request stays reproducible.
    #[serde(default)]
    pub seed: Option<u32>,
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_DIMENSION
}

fn default_face_style() -> FaceStyle {
    FaceStyle::HighFidelity
}

fn default_batch_size() -> u32 {
    MIN_BATCH_SIZE
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Webp
}

fn default_output_quality() -> u8 {
    DEFAULT_OUTPUT_QUALITY
}

impl GenerationRequest {
    /// Validate every range and presence constraint.
    ///
    /// Runs before the binder so no out-of-range value ever reaches
    /// the workflow graph.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.face_image.as_os_str().is_empty() {
            return Err(CoreError::Validation(
                "A face image is required".to_string(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(CoreError::Validation(format!(
                "Width and height must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&self.number_of_images) {
            return Err(CoreError::Validation(format!(
                "number_of_images must be in [{MIN_BATCH_SIZE},{MAX_BATCH_SIZE}], got {}",
                self.number_of_images
            )));
        }
        if self.output_quality > MAX_OUTPUT_QUALITY {
            return Err(CoreError::Validation(format!(
                "output_quality must be in [0,{MAX_OUTPUT_QUALITY}], got {}",
                self.output_quality
            )));
        }
        Ok(())
    }
}

/// Resolve the effective sampler seed for a request.
///
/// An explicit seed is used as-is. An absent seed is drawn uniformly
/// from the full u32 range and logged so the caller can reproduce the
/// request.
pub fn resolve_seed(seed: Option<u32>) -> u32 {
    match seed {
        Some(seed) => seed,
        None => {
            let seed: u32 = rand::rng().random();
            tracing::info!(seed, "Random seed set");
            seed
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::CoreError;

    fn request() -> GenerationRequest {
        serde_json::from_str(r#"{"face_image": "face.jpg"}"#).unwrap()
    }

    #[test]
    fn defaults_match_contract() {
        let req = request();
        assert_eq!(req.prompt, DEFAULT_PROMPT);
        assert_eq!(req.negative_prompt, "");
        assert_eq!(req.width, 1024);
        assert_eq!(req.height, 1024);
        assert_eq!(req.checkpoint_model, None);
        assert_eq!(req.face_style, FaceStyle::HighFidelity);
        assert_eq!(req.number_of_images, 1);
        assert_eq!(req.output_format, OutputFormat::Webp);
        assert_eq!(req.output_quality, 80);
        assert_eq!(req.seed, None);
    }

    #[test]
    fn missing_face_image_fails_deserialization() {
        let result: Result<GenerationRequest, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn empty_face_image_rejected() {
        let mut req = request();
        req.face_image = PathBuf::new();
        assert_matches!(req.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn batch_size_bounds_enforced() {
        for k in MIN_BATCH_SIZE..=MAX_BATCH_SIZE {
            let mut req = request();
            req.number_of_images = k;
            assert!(req.validate().is_ok(), "batch size {k} should be valid");
        }
        for k in [0, 11, 100] {
            let mut req = request();
            req.number_of_images = k;
            assert_matches!(req.validate(), Err(CoreError::Validation(_)));
        }
    }

    #[test]
    fn quality_above_100_rejected() {
        let mut req = request();
        req.output_quality = 101;
        assert_matches!(req.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn zero_dimensions_rejected() {
        let mut req = request();
        req.width = 0;
        assert_matches!(req.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn face_style_parses_kebab_case_only() {
        let hf: FaceStyle = serde_json::from_str(r#""high-fidelity""#).unwrap();
        assert_eq!(hf.method_token(), "fidelity");
        let st: FaceStyle = serde_json::from_str(r#""stylized""#).unwrap();
        assert_eq!(st.method_token(), "style");
        let bad: Result<FaceStyle, _> = serde_json::from_str(r#""photorealistic""#);
        assert!(bad.is_err());
    }

    #[test]
    fn output_format_lossiness() {
        assert!(OutputFormat::Webp.is_lossy());
        assert!(OutputFormat::Jpg.is_lossy());
        assert!(!OutputFormat::Png.is_lossy());
    }

    #[test]
    fn explicit_seed_is_preserved() {
        assert_eq!(resolve_seed(Some(42)), 42);
        assert_eq!(resolve_seed(Some(0)), 0);
        assert_eq!(resolve_seed(Some(u32::MAX)), u32::MAX);
    }
}
