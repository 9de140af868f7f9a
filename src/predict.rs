//! Name → race/ethnicity prediction with the sequence models
//!
//! Pipeline: normalize names, cut them into n-gram ids, pad to the model's
//! feature length, run the classifier once (point estimate) or many times
//! with dropout (interval estimate), aggregate, then join the prediction
//! columns back onto the input by row position.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::aggregate::{aggregate, Aggregation, ConfidenceLevel};
use crate::artifacts::{Checksums, LoadedModel};
use crate::cache::ModelCache;
use crate::catalog::{ModelKind, ModelSpec, NameInput, DEFAULT_ITERATIONS};
use crate::classifier::adapter::DEFAULT_SEED;
use crate::classifier::InferenceMode;
use crate::error::{ConfigError, Result, ValidationError};
use crate::featurize::pad;
use crate::ngram::find_ngrams;
use crate::normalize::{full_name, normalize, Casing};
use crate::records::{ColumnSelector, RecordBatch};

/// One prediction call
#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub model: ModelKind,
    pub last: ColumnSelector,
    /// Required by full-name models, ignored otherwise
    pub first: Option<ColumnSelector>,
    pub year: Option<u16>,
    pub iterations: usize,
    /// `None` uses the model's default
    pub confidence: Option<f64>,
    pub seed: u64,
}

impl PredictRequest {
    pub fn new(model: ModelKind, last: impl Into<ColumnSelector>) -> Self {
        Self {
            model,
            last: last.into(),
            first: None,
            year: None,
            iterations: DEFAULT_ITERATIONS,
            confidence: None,
            seed: DEFAULT_SEED,
        }
    }

    pub fn first(mut self, first: impl Into<ColumnSelector>) -> Self {
        self.first = Some(first.into());
        self
    }

    pub fn year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn confidence(mut self, level: f64) -> Self {
        self.confidence = Some(level);
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check everything that does not need I/O
    fn validate(&self) -> std::result::Result<(ModelSpec, ConfidenceLevel, InferenceMode), ConfigError> {
        let spec = self.model.resolve(self.year)?;
        let level = ConfidenceLevel::new(self.confidence.unwrap_or(spec.default_confidence))?;
        let mode = if level.is_point_estimate() {
            InferenceMode::PointEstimate
        } else {
            InferenceMode::stochastic(self.iterations, self.seed)?
        };
        if spec.input == NameInput::FullName && self.first.is_none() {
            return Err(ConfigError::MissingFirstName(self.model.name()));
        }
        Ok((spec, level, mode))
    }
}

/// Predictions for the rows that had a usable name
#[derive(Debug, Clone)]
pub struct PredictionTable {
    /// Row identity of each aggregated record, ascending
    row_ids: Vec<usize>,
    total_rows: usize,
    aggregation: Aggregation,
}

impl PredictionTable {
    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    /// Rows that had no name and therefore no prediction
    pub fn skipped(&self) -> usize {
        self.total_rows - self.row_ids.len()
    }

    /// Predicted label for an input row, if it was predicted
    pub fn race_for_row(&self, row: usize) -> Option<&str> {
        let index = self.row_ids.binary_search(&row).ok()?;
        self.aggregation.race_label(index)
    }

    /// Append the prediction columns to `records`, matching rows by identity
    pub fn join(&self, records: RecordBatch) -> RecordBatch {
        let names = self.aggregation.column_names();
        let width = names.len();
        let mut predicted = self.row_ids.iter().copied().enumerate().peekable();
        let values = (0..records.len())
            .map(|row| match predicted.peek() {
                Some(&(index, id)) if id == row => {
                    predicted.next();
                    self.aggregation.row_values(index)
                }
                _ => vec![None; width],
            })
            .collect();
        records.append_columns(names, values)
    }
}

/// Runs catalog models against record batches, caching loaded artifacts
pub struct Predictor {
    model_dir: PathBuf,
    checksums: Checksums,
    cache: ModelCache,
}

impl Predictor {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            checksums: Checksums::default(),
            cache: ModelCache::new(),
        }
    }

    pub fn with_checksums(mut self, checksums: Checksums) -> Self {
        self.checksums = checksums;
        self
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Loaded configurations; call `invalidate`/`clear` to force reloads
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Load (or fetch from cache) the artifacts of a model configuration
    pub fn load(&self, spec: &ModelSpec) -> Result<Arc<LoadedModel>> {
        let artifacts = spec.artifacts(&self.model_dir);
        self.cache
            .get_or_try_load(&artifacts, |a| LoadedModel::load(a, &self.checksums))
    }

    /// Predict and return `records` with the prediction columns appended
    pub fn predict(&self, records: RecordBatch, request: &PredictRequest) -> Result<RecordBatch> {
        let table = self.predict_table(&records, request)?;
        Ok(table.join(records))
    }

    /// Predict without joining, for callers that want the raw statistics
    pub fn predict_table(&self, records: &RecordBatch, request: &PredictRequest) -> Result<PredictionTable> {
        let (spec, level, mode) = request.validate()?;
        let names = model_names(records, request, spec.input)?;

        let (row_ids, names): (Vec<usize>, Vec<String>) = names
            .into_iter()
            .enumerate()
            .filter_map(|(row, name)| name.map(|n| (row, n)))
            .unzip();
        if names.is_empty() {
            return Err(ValidationError::EmptyInput { rows: records.len() }.into());
        }
        let skipped = records.len() - names.len();
        if skipped > 0 {
            tracing::warn!("{} rows have no usable name and get no prediction", skipped);
        }

        let model = self.load(&spec)?;
        let sequences: Vec<Vec<u32>> = names
            .iter()
            .map(|name| find_ngrams(model.vocabulary(), Some(name.as_str()), spec.width))
            .collect();
        let features = pad(&sequences, spec.feature_len);
        tracing::debug!(
            "{}: {} names padded to {} ids, highest id {}",
            spec.kind,
            features.rows(),
            features.width(),
            features.max_id()
        );

        let stack = model.adapter().predict(&features, &mode)?;
        let aggregation = aggregate(&stack, model.labels(), level)?;

        Ok(PredictionTable {
            row_ids,
            total_rows: records.len(),
            aggregation,
        })
    }
}

/// Normalized model input per row; `None` where the name is missing
fn model_names(records: &RecordBatch, request: &PredictRequest, input: NameInput) -> Result<Vec<Option<String>>> {
    let last = records.resolve(&request.last)?;
    match input {
        NameInput::LastName => Ok(records
            .column_values(last)
            .map(|v| v.map(|name| normalize(name, Casing::Title)).filter(|n| !n.is_empty()))
            .collect()),
        NameInput::FullName => {
            let selector = request
                .first
                .as_ref()
                .ok_or(ConfigError::MissingFirstName(request.model.name()))?;
            let first = records.resolve(selector)?;
            Ok(records
                .column_values(last)
                .zip(records.column_values(first))
                .map(|(l, f)| full_name(l, f))
                .collect())
        }
    }
}
