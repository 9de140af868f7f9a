//! Predict command - run a sequence model over a CSV of names

use anyhow::Result;
use console::style;
use std::path::PathBuf;

use super::io::{destination, read_input, spinner, write_output};
use crate::catalog::ModelKind;
use crate::config::UserConfig;
use crate::predict::{PredictRequest, Predictor};
use crate::records::ColumnSelector;

pub struct Options {
    pub input: PathBuf,
    pub model: ModelKind,
    pub last: String,
    pub first: Option<String>,
    pub year: Option<u16>,
    pub iterations: Option<usize>,
    pub confidence: Option<f64>,
    pub seed: Option<u64>,
    pub output: Option<PathBuf>,
}

impl Options {
    /// Flags first, then config, then the model's defaults
    fn request(&self, config: &UserConfig) -> PredictRequest {
        let mut request = PredictRequest::new(self.model, ColumnSelector::parse(&self.last))
            .iterations(self.iterations.unwrap_or_else(|| config.iterations()))
            .seed(self.seed.unwrap_or_else(|| config.seed()));
        request.first = self.first.as_deref().map(ColumnSelector::parse);
        request.year = self.year;
        request.confidence = self.confidence.or(config.inference.confidence);
        request
    }
}

/// Run the predict command
pub fn run(config: &UserConfig, opts: Options) -> Result<()> {
    let request = opts.request(config);
    let headerless = request.last.is_position() || request.first.as_ref().is_some_and(|f| f.is_position());
    let records = read_input(&opts.input, !headerless)?;
    let total = records.len();

    let predictor = Predictor::new(config.model_dir()).with_checksums(config.checksums());
    let bar = spinner(format!("Predicting {} names with {}...", total, style(opts.model).cyan()));
    let result = predictor.predict_table(&records, &request);
    bar.finish_and_clear();
    let table = result?;

    let out = table.join(records);
    write_output(&out, opts.output.as_deref())?;

    let agg = table.aggregation();
    let mode = if agg.level().is_point_estimate() {
        "point estimates".to_string()
    } else {
        format!(
            "{:.0}% intervals over {} passes",
            agg.level().value() * 100.0,
            request.iterations
        )
    };
    eprintln!(
        "{} Predicted {} of {} names with {} ({}) → {}",
        style("✓").green(),
        style(agg.len()).cyan(),
        total,
        style(opts.model).yellow(),
        mode,
        style(destination(opts.output.as_deref())).cyan()
    );
    if table.skipped() > 0 {
        eprintln!(
            "{} {} rows had no name and were left without a prediction",
            style("!").yellow(),
            table.skipped()
        );
    }
    Ok(())
}
