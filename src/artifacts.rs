//! Model artifacts: the (model, vocabulary, labels) triple and its loader

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::classifier::{InferenceAdapter, SequenceClassifier, SequenceNetwork};
use crate::error::{ResourceError, Result};
use crate::ngram::Vocabulary;
use crate::records::open_csv;

/// Column holding class labels in a label CSV
const LABEL_COLUMN: &str = "race";

/// Paths of one model configuration; also the model cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelArtifacts {
    pub model: PathBuf,
    pub vocabulary: PathBuf,
    pub labels: PathBuf,
}

impl ModelArtifacts {
    pub fn new(model: impl Into<PathBuf>, vocabulary: impl Into<PathBuf>, labels: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            vocabulary: vocabulary.into(),
            labels: labels.into(),
        }
    }

    /// Resolve relative artifact names against a model directory
    pub fn in_dir(root: &Path, model: &str, vocabulary: &str, labels: &str) -> Self {
        Self::new(root.join(model), root.join(vocabulary), root.join(labels))
    }

    pub fn paths(&self) -> [&Path; 3] {
        [&self.model, &self.vocabulary, &self.labels]
    }
}

/// SHA-256 pins for artifact files, keyed by absolute path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checksums {
    pins: BTreeMap<PathBuf, String>,
}

impl Checksums {
    /// Pins from config, where keys are relative to `root`
    pub fn from_relative(root: &Path, pins: &BTreeMap<String, String>) -> Self {
        let mut checksums = Self::default();
        for (rel, sum) in pins {
            checksums.pin(root.join(rel), sum);
        }
        checksums
    }

    /// Pin one file by absolute path; hex case and surrounding space are ignored
    pub fn pin(&mut self, path: impl Into<PathBuf>, sha256: &str) {
        self.pins.insert(path.into(), normalise_hex(sha256));
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Check `path` against its pin; unpinned files always pass
    pub fn verify(&self, path: &Path) -> Result<()> {
        let Some(expected) = self.pins.get(path) else {
            return Ok(());
        };
        let actual = compute_sha256(path)?;
        if &actual != expected {
            return Err(ResourceError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: expected.clone(),
                actual,
            }
            .into());
        }
        tracing::debug!("checksum ok for {}", path.display());
        Ok(())
    }
}

/// SHA-256 of a file as lowercase hex
pub fn compute_sha256(path: &Path) -> std::result::Result<String, ResourceError> {
    let io_err = |source| ResourceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader.read(&mut buffer).map_err(io_err)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn normalise_hex(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

/// Read a label CSV (`race` column, row order = output channel)
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let csv_err = |source| ResourceError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = open_csv(path)?;
    let column = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h.trim() == LABEL_COLUMN)
        .ok_or_else(|| ResourceError::MissingArtifactColumn {
            path: path.to_path_buf(),
            column: LABEL_COLUMN,
        })?;

    let mut labels = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        labels.push(record.get(column).unwrap_or_default().trim().to_string());
    }
    if labels.is_empty() {
        return Err(ResourceError::EmptyArtifact {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(labels)
}

/// A fully loaded, cross-checked model configuration
#[derive(Debug)]
pub struct LoadedModel {
    artifacts: ModelArtifacts,
    vocabulary: Vocabulary,
    labels: Vec<String>,
    network: Arc<SequenceNetwork>,
}

impl LoadedModel {
    /// Verify pins, read all three artifacts and check they agree
    pub fn load(artifacts: &ModelArtifacts, checksums: &Checksums) -> Result<Self> {
        for path in artifacts.paths() {
            checksums.verify(path)?;
        }

        let vocabulary = Vocabulary::load(&artifacts.vocabulary)?;
        let labels = load_labels(&artifacts.labels)?;
        let network = SequenceNetwork::load(&artifacts.model)?;

        if network.num_classes() != labels.len() {
            return Err(ResourceError::LabelCountMismatch {
                path: artifacts.model.clone(),
                outputs: network.num_classes(),
                labels: artifacts.labels.clone(),
                count: labels.len(),
            }
            .into());
        }
        if network.embedding_rows() < vocabulary.len() {
            return Err(ResourceError::VocabularyTooLarge {
                path: artifacts.model.clone(),
                rows: network.embedding_rows(),
                vocab: artifacts.vocabulary.clone(),
                count: vocabulary.len(),
            }
            .into());
        }

        Ok(Self {
            artifacts: artifacts.clone(),
            vocabulary,
            labels,
            network: Arc::new(network),
        })
    }

    pub fn artifacts(&self) -> &ModelArtifacts {
        &self.artifacts
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn network(&self) -> &SequenceNetwork {
        &self.network
    }

    pub fn adapter(&self) -> InferenceAdapter {
        InferenceAdapter::new(self.network.clone(), self.labels.len())
    }
}
