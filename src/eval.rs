use crate::config::GeneratorSpec;
use crate::error::{EvalError, Result};
use crate::metrics::{Metric, MetricScorer};
use crate::report::{RunSummary, summarize};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Enumerate reference images in `dir`. Order is whatever the directory
/// listing yields; aggregation is order-independent.
pub fn list_reference_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Per-generator score lists, one per configured metric, plus the count of
/// reference items this generator produced an output for.
pub struct ScoreAccumulator {
    pub matched: usize,
    pub scores: Vec<Vec<f32>>,
}

impl ScoreAccumulator {
    fn new(metric_count: usize) -> Self {
        Self {
            matched: 0,
            scores: vec![Vec::new(); metric_count],
        }
    }
}

/// Walks the reference set once, scoring every generator that produced a
/// same-named output against every configured metric.
pub struct BatchEvaluator<'a, S: MetricScorer> {
    scorer: &'a mut S,
    metrics: Vec<Metric>,
}

impl<'a, S: MetricScorer> BatchEvaluator<'a, S> {
    pub fn new(scorer: &'a mut S, metrics: Vec<Metric>) -> Self {
        Self { scorer, metrics }
    }

    pub fn run(
        &mut self,
        reference_dir: &Path,
        generators: &[GeneratorSpec],
        prompt: &str,
    ) -> Result<RunSummary> {
        let references = list_reference_images(reference_dir)?;
        if references.is_empty() {
            return Err(EvalError::EmptyReferenceSet(reference_dir.to_owned()));
        }

        let mut accumulators: Vec<ScoreAccumulator> = generators
            .iter()
            .map(|_| ScoreAccumulator::new(self.metrics.len()))
            .collect();

        for ref_path in &references {
            let Some(ref_name) = ref_path.file_name() else {
                continue;
            };
            // The reference set is the ground truth; an unreadable reference
            // image aborts the run.
            let ref_image = image::open(ref_path)?;

            for (spec, accum) in generators.iter().zip(accumulators.iter_mut()) {
                let gen_path = spec.dir.join(ref_name);
                if !gen_path.exists() {
                    debug!(
                        generator = %spec.name,
                        reference = %ref_name.to_string_lossy(),
                        "no generated image, recording miss"
                    );
                    continue;
                }
                accum.matched += 1;

                let gen_image = match image::open(&gen_path) {
                    Ok(img) => img,
                    Err(err) => {
                        warn!(
                            path = %gen_path.display(),
                            error = %err,
                            "skipping unreadable generated image"
                        );
                        continue;
                    }
                };

                // All metrics for a pair are scored before any result is
                // committed, so a provider failure cannot leave the metric
                // lists at uneven lengths.
                match self.score_pair(&ref_image, &gen_image, prompt) {
                    Ok(scores) => {
                        for (list, score) in accum.scores.iter_mut().zip(scores) {
                            list.push(score);
                        }
                    }
                    Err(err) => {
                        warn!(
                            generator = %spec.name,
                            reference = %ref_name.to_string_lossy(),
                            error = %err,
                            "skipping pair after provider failure"
                        );
                    }
                }
            }
        }

        Ok(summarize(
            &self.metrics,
            generators,
            &accumulators,
            references.len(),
        ))
    }

    fn score_pair(
        &mut self,
        reference: &DynamicImage,
        generated: &DynamicImage,
        prompt: &str,
    ) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(self.metrics.len());
        for &metric in &self.metrics {
            scores.push(self.scorer.score(metric, reference, generated, prompt)?);
        }
        Ok(scores)
    }
}
