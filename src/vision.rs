use crate::config::{Device, ModelConfig};
use crate::error::EvalError;
use crate::metrics::ImageEmbedder;
use crate::onnx::OnnxSession;
use crate::utils;
use image::{DynamicImage, GenericImageView, imageops::FilterType};
use ndarray::{Array2, Array4, ArrayView, Axis, IxDyn};
use ort::value::Value;
use rayon::prelude::*;
use std::path::Path;

/// Image tower of an embedding model: preprocesses to the model's input
/// layout, runs the ONNX session and L2-normalizes the output rows.
#[derive(Debug)]
pub struct VisionEncoder {
    pub session: OnnxSession,
    pub config: ModelConfig,
    pub input_name: String,
}

impl VisionEncoder {
    pub fn new(model_dir: &Path, device: Device) -> Result<Self, EvalError> {
        let model_path = model_dir.join("visual.onnx");
        let config_path = model_dir.join("model_config.json");

        let session = OnnxSession::new(model_path, device)?;
        let config = ModelConfig::from_file(config_path)?;

        let input_name = session
            .find_input(&["pixel_values", "input"])
            .ok_or_else(|| EvalError::Config("Could not find vision input node".to_string()))?;

        Ok(Self {
            session,
            config,
            input_name,
        })
    }

    /// Embed a single image
    pub fn embed_image(&mut self, image: &DynamicImage) -> Result<ndarray::Array1<f32>, EvalError> {
        let embs = self.embed_images(std::slice::from_ref(image))?;
        let len = embs.len();
        embs.into_shape_with_order(len)
            .map_err(|e| EvalError::Inference(e.to_string()))
    }

    /// Embed a batch of images
    pub fn embed_images(&mut self, images: &[DynamicImage]) -> Result<Array2<f32>, EvalError> {
        let batch_tensor = self.preprocess_batch(images)?;

        let input_tensor = Value::from_array(batch_tensor)?;
        let outputs = self
            .session
            .session
            .run(ort::inputs![&self.input_name => input_tensor]?)?;

        let (shape, data) = outputs[0].try_extract_raw_tensor::<f32>()?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let shape_usize: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        let view = ArrayView::from_shape(IxDyn(&shape_usize), data)
            .map_err(|e| EvalError::Inference(e.to_string()))?;

        let embeddings = view
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| EvalError::Inference(e.to_string()))?
            .to_owned();

        Ok(utils::l2_normalize_rows(embeddings))
    }

    /// Preprocess batch of images
    pub fn preprocess_batch(&self, images: &[DynamicImage]) -> Result<Array4<f32>, EvalError> {
        if images.is_empty() {
            return Err(EvalError::Inference("Empty batch".to_string()));
        }

        let batch_size = images.len();
        let size = self.config.image_size as usize;
        let mut batch_tensor = Array4::<f32>::zeros((batch_size, 3, size, size));
        batch_tensor
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(images.par_iter())
            .try_for_each(|(mut slot, img)| self.preprocess_into(img, &mut slot))?;

        Ok(batch_tensor)
    }

    fn preprocess_into(
        &self,
        image: &DynamicImage,
        out_view: &mut ndarray::ArrayViewMut3<f32>,
    ) -> Result<(), EvalError> {
        let size = self.config.image_size;
        let interp = match self.config.interpolation.as_str() {
            "bicubic" => FilterType::CatmullRom,
            "bilinear" => FilterType::Triangle,
            _ => FilterType::Nearest,
        };

        #[allow(
            clippy::single_match_else,
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let resized = match self.config.resize_mode.as_str() {
            "squash" => image.resize_exact(size, size, interp),
            _ => {
                let (width, height) = image.dimensions();
                let scale = size as f32 / width.min(height) as f32;
                let scaled_width = (width as f32 * scale).round() as u32;
                let scaled_height = (height as f32 * scale).round() as u32;
                let resized = image.resize_exact(scaled_width, scaled_height, interp);
                let x = ((scaled_width as f32 - size as f32) / 2.0).round() as u32;
                let y = ((scaled_height as f32 - size as f32) / 2.0).round() as u32;
                resized.crop_imm(x, y, size, size)
            }
        };

        let rgb = resized.to_rgb8();
        let (mean, std) = (self.config.mean, self.config.std);

        let pixels = rgb.as_raw();
        let channel_len = (size as usize).pow(2);
        for c in 0..3 {
            let channel_slice = out_view.index_axis_mut(Axis(0), c);
            let flat_channel = channel_slice
                .into_slice()
                .ok_or_else(|| EvalError::Inference("Layout mismatch".into()))?;
            for i in 0..channel_len {
                let val = f32::from(pixels[i * 3 + c]) / 255.0;
                flat_channel[i] = (val - mean[c]) / std[c];
            }
        }

        Ok(())
    }
}

impl ImageEmbedder for VisionEncoder {
    fn embed_image(&mut self, image: &DynamicImage) -> Result<ndarray::Array1<f32>, EvalError> {
        VisionEncoder::embed_image(self, image)
    }
}
