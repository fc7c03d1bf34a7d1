use crate::error::Result;
use crate::metrics::Metric;
use crate::utils;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Compute device the ONNX sessions are bound to. Passed explicitly to the
/// registry, never read from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

/// Per-model configuration stored as `model_config.json` next to the
/// `.onnx` files in a model directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    // Dimensions
    pub embed_dim: usize,
    pub image_size: u32,

    // Preprocessing
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub interpolation: String,
    pub resize_mode: String,

    // Text tower (vision-language models only)
    #[serde(default)]
    pub context_length: Option<usize>,
    #[serde(default)]
    pub pad_id: Option<u32>,
    #[serde(default)]
    pub tokenizer_needs_lowercase: bool,
}

impl ModelConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

/// One generator under evaluation: a name and the directory holding its
/// outputs, which are matched against reference images by base name.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorSpec {
    pub name: String,
    pub dir: PathBuf,
}

/// Run-level configuration. Loaded from a JSON file when present, otherwise
/// the defaults below apply.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub reference_dir: PathBuf,
    pub generators: Vec<GeneratorSpec>,
    pub prompt: String,
    pub device: Device,
    pub model_root: PathBuf,
    pub metrics: Vec<Metric>,
    pub report_path: PathBuf,
}

impl Default for EvalConfig {
    fn default() -> Self {
        let generators = ["Me2Meme", "InstantID", "LoRAs"]
            .into_iter()
            .map(|name| GeneratorSpec {
                name: name.to_string(),
                dir: Path::new("data").join(name),
            })
            .collect();

        Self {
            reference_dir: PathBuf::from("data/reference_images"),
            generators,
            prompt: "A man.".to_string(),
            device: Device::default(),
            model_root: utils::default_model_root(),
            metrics: Metric::ALL.to_vec(),
            report_path: PathBuf::from("results.tex"),
        }
    }
}

impl EvalConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Read the config file at `path` if it exists, fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_runs_all_metrics() {
        let config = EvalConfig::default();
        assert_eq!(config.metrics.len(), 5);
        assert_eq!(config.generators.len(), 3);
        assert_eq!(config.device, Device::Cpu);
    }

    #[test]
    fn config_parses_from_json() {
        let json = r#"{
            "reference_dir": "refs",
            "generators": [{ "name": "X", "dir": "out/x" }],
            "prompt": "A woman.",
            "device": "cuda",
            "metrics": ["CLIP-T", "DINO"]
        }"#;
        let config: EvalConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.device, Device::Cuda);
        assert_eq!(config.metrics, vec![Metric::ClipText, Metric::Dino]);
        assert_eq!(config.generators[0].name, "X");
        // Unset fields keep their defaults.
        assert_eq!(config.report_path, PathBuf::from("results.tex"));
    }
}
