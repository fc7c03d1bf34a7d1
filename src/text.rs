use crate::config::{Device, ModelConfig};
use crate::error::EvalError;
use crate::metrics::TextEmbedder;
use crate::onnx::OnnxSession;
use crate::utils;
use ndarray::Array2;
use ort::value::Value;
use std::path::Path;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Text tower of a vision-language model: tokenizes to fixed context length,
/// runs the ONNX session and L2-normalizes the output rows.
#[derive(Debug)]
pub struct TextEncoder {
    pub session: OnnxSession,
    pub config: ModelConfig,
    tokenizer: Tokenizer,
    id_name: String,
    mask_name: Option<String>,
}

impl TextEncoder {
    pub fn new(model_dir: &Path, device: Device) -> Result<Self, EvalError> {
        let model_path = model_dir.join("text.onnx");
        let config_path = model_dir.join("model_config.json");
        let tokenizer_path = model_dir.join("tokenizer.json");

        let config = ModelConfig::from_file(config_path)?;
        let session = OnnxSession::new(model_path, device)?;
        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EvalError::Tokenizer(e.to_string()))?;

        let pad_id = config
            .pad_id
            .or_else(|| tokenizer.get_vocab(true).get("<pad>").copied())
            .ok_or_else(|| EvalError::Config("No pad token found in tokenizer".into()))?;
        let ctx_len = config
            .context_length
            .ok_or_else(|| EvalError::Config("No context_length in model config".into()))?;

        tokenizer
            .with_padding(Some(PaddingParams {
                strategy: PaddingStrategy::Fixed(ctx_len),
                pad_id,
                ..Default::default()
            }))
            .with_truncation(Some(TruncationParams {
                max_length: ctx_len,
                ..Default::default()
            }))
            .map_err(|e| EvalError::Tokenizer(e.to_string()))?;

        let id_name = session
            .find_input(&["input_ids"])
            .ok_or_else(|| EvalError::Config("Could not find text input node".into()))?;
        let mask_name = session.find_input(&["attention_mask"]);

        Ok(Self {
            session,
            config,
            tokenizer,
            id_name,
            mask_name,
        })
    }

    pub fn tokenize<T: AsRef<str>>(
        &self,
        texts: &[T],
    ) -> Result<(Array2<i64>, Array2<i64>), EvalError> {
        let encodings = if self.config.tokenizer_needs_lowercase {
            let lowered = texts.iter().map(|s| s.as_ref().to_lowercase()).collect();
            self.tokenizer.encode_batch(lowered, true)
        } else {
            let texts = texts.iter().map(AsRef::as_ref).collect();
            self.tokenizer.encode_batch(texts, true)
        }
        .map_err(|e| EvalError::Tokenizer(e.to_string()))?;

        let batch_size = encodings.len();
        let seq_len = self.config.context_length.unwrap_or_default();

        let ids: Vec<i64> = encodings
            .iter()
            .flat_map(|e| e.get_ids().iter().map(|&x| i64::from(x)))
            .collect();
        let mask: Vec<i64> = encodings
            .iter()
            .flat_map(|e| e.get_attention_mask().iter().map(|&x| i64::from(x)))
            .collect();

        let ids_array = Array2::from_shape_vec((batch_size, seq_len), ids)
            .map_err(|e| EvalError::Inference(e.to_string()))?;
        let mask_array = Array2::from_shape_vec((batch_size, seq_len), mask)
            .map_err(|e| EvalError::Inference(e.to_string()))?;

        Ok((ids_array, mask_array))
    }

    pub fn embed_text(&mut self, text: &str) -> Result<ndarray::Array1<f32>, EvalError> {
        let embs = self.embed_texts(&[text])?;
        let len = embs.len();
        embs.into_shape_with_order(len)
            .map_err(|e| EvalError::Inference(e.to_string()))
    }

    pub fn embed_texts<T: AsRef<str>>(&mut self, texts: &[T]) -> Result<Array2<f32>, EvalError> {
        let (ids_tensor, mask_tensor) = self.tokenize(texts)?;

        let ort_ids = Value::from_array(ids_tensor)?;
        let outputs = if let Some(m_name) = &self.mask_name {
            let ort_mask = Value::from_array(mask_tensor)?;
            self.session
                .session
                .run(ort::inputs![&self.id_name => ort_ids, m_name => ort_mask]?)?
        } else {
            self.session
                .session
                .run(ort::inputs![&self.id_name => ort_ids]?)?
        };

        let (shape, data) = outputs[0].try_extract_raw_tensor::<f32>()?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let shape_usize: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        let view = ndarray::ArrayView::from_shape(ndarray::IxDyn(&shape_usize), data)
            .map_err(|e| EvalError::Inference(e.to_string()))?;
        let embeddings = view
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| EvalError::Inference(e.to_string()))?
            .to_owned();

        Ok(utils::l2_normalize_rows(embeddings))
    }
}

impl TextEmbedder for TextEncoder {
    fn embed_text(&mut self, text: &str) -> Result<ndarray::Array1<f32>, EvalError> {
        TextEncoder::embed_text(self, text)
    }
}
