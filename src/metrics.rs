use crate::error::Result;
use crate::registry::{ModelRegistry, Provider, ProviderKind};
use image::DynamicImage;
use ndarray::{Array1, ArrayView1};
use serde::Deserialize;

/// Maps an image to a unit-norm embedding vector.
pub trait ImageEmbedder {
    fn embed_image(&mut self, image: &DynamicImage) -> Result<Array1<f32>>;
}

/// Maps a text string to a unit-norm embedding vector.
pub trait TextEmbedder {
    fn embed_text(&mut self, text: &str) -> Result<Array1<f32>>;
}

/// Full cosine similarity. Providers normalize their outputs, but this does
/// not rely on it; non-normalized inputs still score correctly.
/// Zero-magnitude inputs score 0.0.
#[must_use]
pub fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    let denom = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if denom > 0.0 { a.dot(&b) / denom } else { 0.0 }
}

/// Text-image similarity: encode both through the same vision-language model
/// and compare.
pub fn text_image_similarity<M>(model: &mut M, text: &str, image: &DynamicImage) -> Result<f32>
where
    M: TextEmbedder + ImageEmbedder,
{
    let text_features = model.embed_text(text)?;
    let image_features = model.embed_image(image)?;
    Ok(cosine_similarity(text_features.view(), image_features.view()))
}

/// Image-image similarity through a single image embedding model.
pub fn image_image_similarity<M: ImageEmbedder>(
    model: &mut M,
    image1: &DynamicImage,
    image2: &DynamicImage,
) -> Result<f32> {
    let features1 = model.embed_image(image1)?;
    let features2 = model.embed_image(image2)?;
    Ok(cosine_similarity(features1.view(), features2.view()))
}

/// The configured evaluation operations. Each one binds a provider family to
/// a comparison procedure; the binding is fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Metric {
    #[serde(rename = "CLIP-T")]
    ClipText,
    #[serde(rename = "CLIP-I")]
    ClipImage,
    #[serde(rename = "DINO")]
    Dino,
    #[serde(rename = "FaceSim")]
    FaceSim,
    #[serde(rename = "FGIS")]
    Fgis,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::ClipText,
        Metric::ClipImage,
        Metric::Dino,
        Metric::FaceSim,
        Metric::Fgis,
    ];

    /// Display name, also used as the report column header.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Metric::ClipText => "CLIP-T",
            Metric::ClipImage => "CLIP-I",
            Metric::Dino => "DINO",
            Metric::FaceSim => "FaceSim",
            Metric::Fgis => "FGIS",
        }
    }

    /// The provider family this metric draws embeddings from.
    #[must_use]
    pub fn provider(self) -> ProviderKind {
        match self {
            Metric::ClipText | Metric::ClipImage => ProviderKind::Clip,
            Metric::Dino => ProviderKind::Dino,
            Metric::FaceSim => ProviderKind::FaceSim,
            Metric::Fgis => ProviderKind::Fgis,
        }
    }
}

/// Scores a single (reference, generated) pair under one metric. The driver
/// is generic over this so tests can run it against deterministic stubs.
pub trait MetricScorer {
    fn score(
        &mut self,
        metric: Metric,
        reference: &DynamicImage,
        generated: &DynamicImage,
        prompt: &str,
    ) -> Result<f32>;
}

/// One provider instance per family, created once per run and reused across
/// all items.
pub struct MetricSet {
    clip: Provider,
    dino: Provider,
    face: Provider,
    fgis: Provider,
}

impl MetricSet {
    pub fn load(registry: &ModelRegistry) -> Result<Self> {
        Ok(Self {
            clip: registry.create(ProviderKind::Clip)?,
            dino: registry.create(ProviderKind::Dino)?,
            face: registry.create(ProviderKind::FaceSim)?,
            fgis: registry.create(ProviderKind::Fgis)?,
        })
    }
}

impl MetricScorer for MetricSet {
    fn score(
        &mut self,
        metric: Metric,
        reference: &DynamicImage,
        generated: &DynamicImage,
        prompt: &str,
    ) -> Result<f32> {
        match metric {
            Metric::ClipText => text_image_similarity(&mut self.clip, prompt, generated),
            Metric::ClipImage => image_image_similarity(&mut self.clip, reference, generated),
            Metric::Dino => image_image_similarity(&mut self.dino, reference, generated),
            Metric::FaceSim => image_image_similarity(&mut self.face, reference, generated),
            Metric::Fgis => image_image_similarity(&mut self.fgis, reference, generated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use ndarray::array;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = array![0.3_f32, 0.5, 0.8];
        let sim = cosine_similarity(v.view(), v.view());
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = array![1.0_f32, 2.0, 3.0];
        let b = array![-2.0_f32, 0.5, 1.5];
        assert_eq!(
            cosine_similarity(a.view(), b.view()),
            cosine_similarity(b.view(), a.view())
        );
    }

    #[test]
    fn cosine_does_not_assume_normalized_inputs() {
        // Same direction, different magnitudes.
        let a = array![3.0_f32, 0.0];
        let b = array![1.0_f32, 0.0];
        assert!((cosine_similarity(a.view(), b.view()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_and_opposite_vectors() {
        let x = array![1.0_f32, 0.0];
        let y = array![0.0_f32, 1.0];
        assert!(cosine_similarity(x.view(), y.view()).abs() < 1e-6);

        let neg = array![-1.0_f32, 0.0];
        assert!((cosine_similarity(x.view(), neg.view()) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        let zero = array![0.0_f32, 0.0];
        let v = array![1.0_f32, 2.0];
        assert_eq!(cosine_similarity(zero.view(), v.view()), 0.0);
    }

    /// Deterministic embedder: flattened pixel values, offset so that a fully
    /// black image still has magnitude.
    struct PixelEmbedder;

    impl ImageEmbedder for PixelEmbedder {
        fn embed_image(&mut self, image: &DynamicImage) -> Result<Array1<f32>> {
            let pixels: Vec<f32> = image
                .to_rgb8()
                .into_raw()
                .into_iter()
                .map(|p| f32::from(p) + 1.0)
                .collect();
            Ok(Array1::from_vec(pixels))
        }
    }

    impl TextEmbedder for PixelEmbedder {
        fn embed_text(&mut self, text: &str) -> Result<Array1<f32>> {
            let bytes: Vec<f32> = text.bytes().map(|b| f32::from(b) + 1.0).collect();
            Ok(Array1::from_vec(bytes))
        }
    }

    fn flat_image(r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([r, g, b])))
    }

    #[test]
    fn identical_images_score_one() {
        let img = flat_image(120, 30, 200);
        let score = image_image_similarity(&mut PixelEmbedder, &img, &img.clone()).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn image_similarity_is_symmetric() {
        let a = flat_image(10, 20, 30);
        let b = flat_image(200, 100, 50);
        let ab = image_image_similarity(&mut PixelEmbedder, &a, &b).unwrap();
        let ba = image_image_similarity(&mut PixelEmbedder, &b, &a).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn repeated_evaluation_is_bit_identical() {
        let a = flat_image(77, 5, 91);
        let b = flat_image(4, 180, 22);
        let first = image_image_similarity(&mut PixelEmbedder, &a, &b).unwrap();
        let second = image_image_similarity(&mut PixelEmbedder, &a, &b).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn metric_names_and_providers_are_stable() {
        assert_eq!(Metric::ALL.len(), 5);
        assert_eq!(Metric::ClipText.name(), "CLIP-T");
        assert_eq!(Metric::ClipText.provider(), ProviderKind::Clip);
        assert_eq!(Metric::ClipImage.provider(), ProviderKind::Clip);
        assert_eq!(Metric::FaceSim.provider(), ProviderKind::FaceSim);
    }
}
