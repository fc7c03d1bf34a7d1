use crate::clip::Clip;
use crate::config::Device;
use crate::error::{EvalError, Result};
use crate::metrics::{ImageEmbedder, TextEmbedder};
use crate::vision::VisionEncoder;
use image::DynamicImage;
use ndarray::Array1;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The closed set of embedding model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Vision-language model with image and text towers.
    Clip,
    /// Self-supervised vision transformer.
    Dino,
    /// Face similarity model.
    FaceSim,
    /// Fine-grained image similarity model.
    Fgis,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Clip,
        ProviderKind::Dino,
        ProviderKind::FaceSim,
        ProviderKind::Fgis,
    ];

    /// Subdirectory of the model root holding this family's files.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            ProviderKind::Clip => "clip",
            ProviderKind::Dino => "dino",
            ProviderKind::FaceSim => "facesim",
            ProviderKind::Fgis => "fgis",
        }
    }

    /// Files a valid model directory for this family must contain.
    fn required_files(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Clip => &[
                "visual.onnx",
                "text.onnx",
                "tokenizer.json",
                "model_config.json",
            ],
            ProviderKind::Dino | ProviderKind::FaceSim | ProviderKind::Fgis => {
                &["visual.onnx", "model_config.json"]
            }
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Clip => "CLIP",
            ProviderKind::Dino => "DINO",
            ProviderKind::FaceSim => "FaceSim",
            ProviderKind::Fgis => "FGIS",
        };
        f.write_str(name)
    }
}

impl FromStr for ProviderKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CLIP" => Ok(ProviderKind::Clip),
            "DINO" => Ok(ProviderKind::Dino),
            "FaceSim" => Ok(ProviderKind::FaceSim),
            "FGIS" => Ok(ProviderKind::Fgis),
            other => Err(EvalError::Config(format!("unknown model name: {other}"))),
        }
    }
}

/// An instantiated embedding provider, bound to a device at creation.
#[derive(Debug)]
pub enum Provider {
    Clip(Clip),
    Dino(VisionEncoder),
    FaceSim(VisionEncoder),
    Fgis(VisionEncoder),
}

impl Provider {
    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Clip(_) => ProviderKind::Clip,
            Provider::Dino(_) => ProviderKind::Dino,
            Provider::FaceSim(_) => ProviderKind::FaceSim,
            Provider::Fgis(_) => ProviderKind::Fgis,
        }
    }
}

impl ImageEmbedder for Provider {
    fn embed_image(&mut self, image: &DynamicImage) -> Result<Array1<f32>> {
        match self {
            Provider::Clip(clip) => clip.embed_image(image),
            Provider::Dino(enc) | Provider::FaceSim(enc) | Provider::Fgis(enc) => {
                enc.embed_image(image)
            }
        }
    }
}

impl TextEmbedder for Provider {
    fn embed_text(&mut self, text: &str) -> Result<Array1<f32>> {
        match self {
            Provider::Clip(clip) => clip.embed_text(text),
            other => Err(EvalError::Config(format!(
                "provider '{}' has no text tower",
                other.kind()
            ))),
        }
    }
}

/// Resolves provider kinds to instances. No caching; callers own reuse.
pub struct ModelRegistry {
    model_root: PathBuf,
    device: Device,
}

impl ModelRegistry {
    #[must_use]
    pub fn new(model_root: PathBuf, device: Device) -> Self {
        Self { model_root, device }
    }

    pub fn create(&self, kind: ProviderKind) -> Result<Provider> {
        let model_dir = self.model_root.join(kind.dir_name());
        verify_model_dir(&model_dir, kind.required_files())?;

        match kind {
            ProviderKind::Clip => Ok(Provider::Clip(Clip::new(&model_dir, self.device)?)),
            ProviderKind::Dino => Ok(Provider::Dino(VisionEncoder::new(&model_dir, self.device)?)),
            ProviderKind::FaceSim => Ok(Provider::FaceSim(VisionEncoder::new(
                &model_dir,
                self.device,
            )?)),
            ProviderKind::Fgis => Ok(Provider::Fgis(VisionEncoder::new(&model_dir, self.device)?)),
        }
    }
}

/// Verify that a model directory exists and contains the right files.
pub fn verify_model_dir(model_dir: &Path, files: &[&str]) -> Result<()> {
    if !model_dir.exists() {
        return Err(EvalError::ModelDirNotFound(model_dir.to_owned()));
    }

    for file in files {
        let path = model_dir.join(file);
        if !path.is_file() {
            return Err(EvalError::MissingModelFile {
                model_dir: model_dir.to_owned(),
                file: (*file).to_string(),
            });
        }
    }

    Ok(())
}
