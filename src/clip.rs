use crate::config::Device;
use crate::error::EvalError;
use crate::metrics::{ImageEmbedder, TextEmbedder};
use crate::text::TextEncoder;
use crate::vision::VisionEncoder;
use image::DynamicImage;
use std::path::Path;

/// A convenience wrapper that holds both towers of a vision-language model.
#[derive(Debug)]
pub struct Clip {
    pub vision: VisionEncoder,
    pub text: TextEncoder,
}

impl Clip {
    /// Load both towers from a model directory.
    pub fn new(model_dir: &Path, device: Device) -> Result<Self, EvalError> {
        let vision = VisionEncoder::new(model_dir, device)?;
        let text = TextEncoder::new(model_dir, device)?;
        Ok(Self { vision, text })
    }
}

impl ImageEmbedder for Clip {
    fn embed_image(&mut self, image: &DynamicImage) -> Result<ndarray::Array1<f32>, EvalError> {
        self.vision.embed_image(image)
    }
}

impl TextEmbedder for Clip {
    fn embed_text(&mut self, text: &str) -> Result<ndarray::Array1<f32>, EvalError> {
        self.text.embed_text(text)
    }
}
