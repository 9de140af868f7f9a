//! Error types for the prediction pipeline
//!
//! Every failure is either a validation failure (the request can be fixed by
//! the caller) or fatal (an artifact could not be loaded, or a model returned
//! output of the wrong shape). Callers branch on [`EthnicolrError::is_fatal`]
//! instead of matching message text.

use std::path::PathBuf;

use thiserror::Error;

use crate::records::ColumnSelector;

/// Request rejected before any I/O happens
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown model `{0}` (run `ethnicolr models` for the list)")]
    UnknownModel(String),

    #[error("model `{model}` does not support year {year} (supported: {supported:?})")]
    UnsupportedYear {
        model: &'static str,
        year: u16,
        supported: &'static [u16],
    },

    #[error("census data is only available for 2000 and 2010, not {0}")]
    UnsupportedCensusYear(u16),

    #[error("confidence level must be in (0, 1], got {0}")]
    InvalidConfidence(f64),

    #[error("number of iterations must be at least 1")]
    ZeroIterations,

    #[error("model `{0}` needs a first-name column")]
    MissingFirstName(&'static str),

    #[error("invalid n-gram range {lo}..={hi}")]
    InvalidNgramRange { lo: usize, hi: usize },
}

/// Input batch does not fit the request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("no column {0} in the input")]
    MissingColumn(ColumnSelector),

    #[error("no usable names in the input: all {rows} rows are empty")]
    EmptyInput { rows: usize },

    #[error("row {row} has {actual} fields but the header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Artifact could not be read or does not hold what it claims to
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to parse model {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} expected SHA-256 {expected} but found {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{path} has no `{column}` column")]
    MissingArtifactColumn { path: PathBuf, column: &'static str },

    #[error("{path} is empty")]
    EmptyArtifact { path: PathBuf },

    #[error("corrupt model {path}: {reason}")]
    CorruptModel { path: PathBuf, reason: String },

    #[error("model {path} outputs {outputs} classes but {labels} has {count} labels")]
    LabelCountMismatch {
        path: PathBuf,
        outputs: usize,
        labels: PathBuf,
        count: usize,
    },

    #[error("model {path} embeds {rows} tokens but vocabulary {vocab} has {count} entries")]
    VocabularyTooLarge {
        path: PathBuf,
        rows: usize,
        vocab: PathBuf,
        count: usize,
    },
}

/// Tensor shapes disagree somewhere between featurizer, model and aggregator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("expected {expected} rows of probabilities but got {actual}")]
    BatchSize { expected: usize, actual: usize },

    #[error("expected {expected} classes per row but got {actual}")]
    ClassCount { expected: usize, actual: usize },

    #[error("probability stack is empty")]
    EmptyStack,

    #[error("point estimates need a single deterministic pass, got {iterations} stochastic passes")]
    StochasticStackForPointEstimate { iterations: usize },

    #[error("layer `{layer}` expected {expected} but received {actual}")]
    Layer {
        layer: &'static str,
        expected: String,
        actual: String,
    },

    #[error("token id {id} is outside the embedding table of {rows} rows")]
    TokenOutOfRange { id: u32, rows: usize },
}

/// Top-level error for everything the library does
#[derive(Error, Debug)]
pub enum EthnicolrError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl EthnicolrError {
    /// Resource and shape errors cannot be fixed by changing the request
    pub fn is_fatal(&self) -> bool {
        matches!(self, EthnicolrError::Resource(_) | EthnicolrError::Shape(_))
    }
}

pub type Result<T> = std::result::Result<T, EthnicolrError>;
