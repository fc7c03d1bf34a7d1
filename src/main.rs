use anyhow::{Context, Result};
use simbench::config::EvalConfig;
use simbench::eval::BatchEvaluator;
use simbench::metrics::MetricSet;
use simbench::registry::ModelRegistry;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "simbench.json";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = EvalConfig::load_or_default(CONFIG_PATH)
        .with_context(|| format!("failed to load {CONFIG_PATH}"))?;

    let registry = ModelRegistry::new(config.model_root.clone(), config.device);
    let mut models = MetricSet::load(&registry).context("failed to load embedding models")?;

    let mut evaluator = BatchEvaluator::new(&mut models, config.metrics.clone());
    let summary = evaluator.run(&config.reference_dir, &config.generators, &config.prompt)?;

    summary
        .write_latex(&config.report_path)
        .with_context(|| format!("failed to write {}", config.report_path.display()))?;

    print!("{}", summary.console_table());
    println!(
        "Evaluated {} generators against {} reference images, report written to {}",
        summary.generators.len(),
        summary.total_references,
        config.report_path.display()
    );

    Ok(())
}
