//! ethnicolr - predict race/ethnicity from names
//!
//! Two prediction paths share one record model:
//! - [`census::lookup`] joins last names against the census surname tables
//! - [`predict::Predictor`] runs character n-gram sequence models, either as
//!   a single deterministic pass or as MC-dropout passes aggregated into
//!   confidence intervals
//!
//! ```no_run
//! use ethnicolr::catalog::ModelKind;
//! use ethnicolr::predict::{PredictRequest, Predictor};
//! use ethnicolr::records::RecordBatch;
//!
//! # fn main() -> ethnicolr::error::Result<()> {
//! let records = RecordBatch::from_str_rows(&["last"], &[&["smith"], &["zhang"]])?;
//! let predictor = Predictor::new("/opt/ethnicolr/models");
//! let request = PredictRequest::new(ModelKind::WikiLastName, "last").confidence(0.9);
//! let out = predictor.predict(records, &request)?;
//! assert_eq!(out.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod artifacts;
pub mod cache;
pub mod catalog;
pub mod census;
pub mod classifier;
#[doc(hidden)]
pub mod cli;
pub mod config;
pub mod error;
pub mod featurize;
pub mod ngram;
pub mod normalize;
pub mod predict;
pub mod records;

pub use error::{EthnicolrError, Result};
