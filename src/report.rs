use crate::config::GeneratorSpec;
use crate::error::Result;
use crate::eval::ScoreAccumulator;
use crate::metrics::Metric;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const TABLE_CAPTION: &str = "Mean similarity and success rate per generator";
const TABLE_LABEL: &str = "tab:similarity";

/// Final per-generator numbers. Means cover only successfully scored pairs;
/// the success rate counts every reference item.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSummary {
    pub name: String,
    /// Mean score per metric, parallel to the run's metric list. 0.0 when a
    /// metric has no samples.
    pub means: Vec<f32>,
    pub matched: usize,
    /// In [0, 1]: matched / total reference count.
    pub success_rate: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub metrics: Vec<Metric>,
    pub generators: Vec<GeneratorSummary>,
    pub total_references: usize,
}

/// Reduce the driver's accumulators to per-generator summaries.
#[must_use]
pub fn summarize(
    metrics: &[Metric],
    generators: &[GeneratorSpec],
    accumulators: &[ScoreAccumulator],
    total_references: usize,
) -> RunSummary {
    let generators = generators
        .iter()
        .zip(accumulators)
        .map(|(spec, accum)| {
            let means = accum.scores.iter().map(|scores| mean(scores)).collect();
            #[allow(clippy::cast_precision_loss)]
            let success_rate = if total_references == 0 {
                0.0
            } else {
                accum.matched as f32 / total_references as f32
            };
            GeneratorSummary {
                name: spec.name.clone(),
                means,
                matched: accum.matched,
                success_rate,
            }
        })
        .collect();

    RunSummary {
        metrics: metrics.to_vec(),
        generators,
        total_references,
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(scores: &[f32]) -> f32 {
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f32>() / scores.len() as f32
    }
}

impl RunSummary {
    /// Column headers: one per metric, then the success rate.
    fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = self
            .metrics
            .iter()
            .map(|m| format!("{} (%)", m.name()))
            .collect();
        headers.push("Success Rate (%)".to_string());
        headers
    }

    fn row_values(summary: &GeneratorSummary) -> Vec<String> {
        let mut values: Vec<String> = summary
            .means
            .iter()
            .map(|mean| format!("{:.2}", mean * 100.0))
            .collect();
        values.push(format!("{:.2}", summary.success_rate * 100.0));
        values
    }

    /// Render the LaTeX table written to the report file.
    #[must_use]
    pub fn latex_table(&self) -> String {
        let headers = self.headers();
        let column_spec = "|c".repeat(headers.len() + 1) + "|";

        let mut table = String::new();
        let _ = writeln!(table, "\\begin{{table}}[h]");
        let _ = writeln!(table, "    \\centering");
        let _ = writeln!(table, "    \\begin{{tabular}}{{{column_spec}}}");
        let _ = writeln!(table, "        \\hline");

        let header_cells: Vec<String> = std::iter::once("Model".to_string())
            .chain(headers)
            .map(|h| format!("\\textbf{{{}}}", h.replace('%', "\\%")))
            .collect();
        let _ = writeln!(table, "        {} \\\\", header_cells.join(" & "));
        let _ = writeln!(table, "        \\hline");

        for summary in &self.generators {
            let mut cells = vec![summary.name.clone()];
            cells.extend(Self::row_values(summary));
            let _ = writeln!(table, "        {} \\\\", cells.join(" & "));
        }

        let _ = writeln!(table, "        \\hline");
        let _ = writeln!(table, "    \\end{{tabular}}");
        let _ = writeln!(table, "    \\caption{{{TABLE_CAPTION}}}");
        let _ = writeln!(table, "    \\label{{{TABLE_LABEL}}}");
        let _ = writeln!(table, "\\end{{table}}");
        table
    }

    /// Render the pipe-delimited console table with the same numbers as the
    /// LaTeX output.
    #[must_use]
    pub fn console_table(&self) -> String {
        let headers = self.headers();

        let mut table = String::new();
        let header_row: Vec<&str> = std::iter::once("Generator")
            .chain(headers.iter().map(String::as_str))
            .collect();
        let _ = writeln!(table, "| {} |", header_row.join(" | "));
        let _ = writeln!(
            table,
            "|{}|",
            header_row.iter().map(|_| "---").collect::<Vec<_>>().join("|")
        );

        for summary in &self.generators {
            let mut cells = vec![summary.name.clone()];
            cells.extend(Self::row_values(summary));
            let _ = writeln!(table, "| {} |", cells.join(" | "));
        }
        table
    }

    pub fn write_latex(&self, path: &Path) -> Result<()> {
        fs::write(path, self.latex_table())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn spec(name: &str) -> GeneratorSpec {
        GeneratorSpec {
            name: name.to_string(),
            dir: PathBuf::from("unused"),
        }
    }

    fn scenario_summary() -> RunSummary {
        // Generator X matched 2 of 3 references, Y matched none.
        let metrics = [Metric::ClipText, Metric::Dino];
        let accumulators = [
            ScoreAccumulator {
                matched: 2,
                scores: vec![vec![0.5, 0.7], vec![0.9, 0.9]],
            },
            ScoreAccumulator {
                matched: 0,
                scores: vec![Vec::new(), Vec::new()],
            },
        ];
        summarize(&metrics, &[spec("X"), spec("Y")], &accumulators, 3)
    }

    #[test]
    fn success_rate_is_matched_over_total() {
        let summary = scenario_summary();
        assert!((summary.generators[0].success_rate - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(summary.generators[1].success_rate, 0.0);
        for generator in &summary.generators {
            assert!((0.0..=1.0).contains(&generator.success_rate));
        }
    }

    #[test]
    fn means_cover_only_matched_samples_and_default_to_zero() {
        let summary = scenario_summary();
        assert!((summary.generators[0].means[0] - 0.6).abs() < 1e-6);
        assert!((summary.generators[0].means[1] - 0.9).abs() < 1e-6);
        assert_eq!(summary.generators[1].means, vec![0.0, 0.0]);
    }

    #[test]
    fn latex_columns_follow_the_metric_list() {
        let summary = scenario_summary();
        let latex = summary.latex_table();
        // Name column + two metrics + success rate.
        assert!(latex.contains("\\begin{tabular}{|c|c|c|c|}"));
        assert!(latex.contains("\\textbf{CLIP-T (\\%)}"));
        assert!(latex.contains("\\textbf{DINO (\\%)}"));
        assert!(latex.contains("\\textbf{Success Rate (\\%)}"));
        assert!(!latex.contains("FGIS"));
        assert!(latex.contains("\\caption{Mean similarity and success rate per generator}"));
        assert!(latex.contains("\\label{tab:similarity}"));
    }

    #[test]
    fn tables_render_percentages_with_two_decimals() {
        let summary = scenario_summary();
        let latex = summary.latex_table();
        let console = summary.console_table();

        assert!(latex.contains("X & 60.00 & 90.00 & 66.67 \\\\"));
        assert!(latex.contains("Y & 0.00 & 0.00 & 0.00 \\\\"));
        assert!(console.contains("| X | 60.00 | 90.00 | 66.67 |"));
        assert!(console.contains("| Y | 0.00 | 0.00 | 0.00 |"));
    }

    #[test]
    fn zero_total_references_defines_success_rate_zero() {
        let accumulators = [ScoreAccumulator {
            matched: 0,
            scores: vec![Vec::new()],
        }];
        let summary = summarize(&[Metric::Fgis], &[spec("X")], &accumulators, 0);
        assert_eq!(summary.generators[0].success_rate, 0.0);
    }

    #[test]
    fn latex_report_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.tex");
        let summary = scenario_summary();
        summary.write_latex(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, summary.latex_table());
    }
}
