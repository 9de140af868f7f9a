//! JSON layer-export evaluator
//!
//! Loads the `{"input_length": .., "layers": [..]}` documents the sequence
//! models are exported as and evaluates them with nalgebra. The layer list is
//! validated once at load so forward passes never see mismatched widths.

use std::path::Path;

use nalgebra::{DMatrix, DVector};
use rand::RngCore;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::layers::{self, Activation, Dense, Embedding, GateActivation, Lstm, Tensor};
use super::{Pass, ProbabilityMatrix, SequenceClassifier};
use crate::error::{ResourceError, Result, ShapeError};
use crate::featurize::FeatureMatrix;

/// One layer as it appears in the exported JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Embedding {
        /// (vocabulary, dim)
        weights: Vec<Vec<f32>>,
        #[serde(default)]
        mask_zero: bool,
    },
    Lstm {
        /// (input, 4 * units), gates i, f, c, o
        kernel: Vec<Vec<f32>>,
        /// (units, 4 * units)
        recurrent_kernel: Vec<Vec<f32>>,
        bias: Vec<f32>,
        #[serde(default)]
        dropout: f32,
        #[serde(default)]
        recurrent_dropout: f32,
        #[serde(default)]
        recurrent_activation: GateActivation,
        #[serde(default)]
        return_sequences: bool,
    },
    GlobalAveragePooling,
    Dropout {
        rate: f32,
    },
    Dense {
        /// (input, output)
        kernel: Vec<Vec<f32>>,
        bias: Vec<f32>,
        #[serde(default)]
        activation: Activation,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct NetworkExport {
    #[serde(default)]
    input_length: Option<usize>,
    layers: Vec<LayerSpec>,
}

enum Layer {
    Embedding(Embedding),
    Lstm(Lstm),
    Pooling { dim: usize },
    Dropout { rate: f32 },
    Dense(Dense),
}

/// What flows out of a layer, used to check the width chain at build time
#[derive(Debug, Clone, Copy)]
enum Flow {
    Sequence(usize),
    Vector(usize),
}

/// Embedding-first network producing one probability vector per record
pub struct SequenceNetwork {
    input_length: Option<usize>,
    layers: Vec<Layer>,
    num_classes: usize,
    embedding_rows: usize,
}

impl std::fmt::Debug for SequenceNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceNetwork")
            .field("input_length", &self.input_length)
            .field("layers", &self.layers.len())
            .field("num_classes", &self.num_classes)
            .field("embedding_rows", &self.embedding_rows)
            .finish()
    }
}

impl SequenceNetwork {
    /// Build and validate a network from layer specs
    pub fn from_layers(input_length: Option<usize>, specs: Vec<LayerSpec>) -> std::result::Result<Self, String> {
        let mut specs = specs.into_iter().enumerate();

        let (table, mask_zero) = match specs.next() {
            Some((_, LayerSpec::Embedding { weights, mask_zero })) => {
                (matrix("embedding weights", &weights)?, mask_zero)
            }
            Some(_) => return Err("first layer must be an embedding".to_string()),
            None => return Err("network has no layers".to_string()),
        };
        if table.nrows() == 0 || table.ncols() == 0 {
            return Err("embedding table is empty".to_string());
        }
        let embedding_rows = table.nrows();
        let mut flow = Flow::Sequence(table.ncols());
        let mut layers = vec![Layer::Embedding(Embedding { table, mask_zero })];

        for (i, spec) in specs {
            let (layer, next) = build_layer(spec, flow).map_err(|e| format!("layer {}: {}", i, e))?;
            layers.push(layer);
            flow = next;
        }

        let num_classes = match flow {
            Flow::Vector(k) if k > 0 => k,
            Flow::Vector(_) => return Err("network has no outputs".to_string()),
            Flow::Sequence(_) => {
                return Err("network ends in a sequence; expected pooling or a final LSTM".to_string())
            }
        };

        Ok(Self {
            input_length,
            layers,
            num_classes,
            embedding_rows,
        })
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let export: NetworkExport = serde_json::from_str(json).map_err(|e| e.to_string())?;
        Self::from_layers(export.input_length, export.layers)
    }

    /// Load an exported model from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ResourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path, content.as_bytes())
    }

    /// Parse an already-read model file; `path` is only used in errors
    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        let export: NetworkExport = serde_json::from_slice(bytes).map_err(|source| ResourceError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let network = Self::from_layers(export.input_length, export.layers).map_err(|reason| {
            ResourceError::CorruptModel {
                path: path.to_path_buf(),
                reason,
            }
        })?;
        tracing::info!(
            "loaded model {} ({} layers, {} classes)",
            path.display(),
            network.layers.len(),
            network.num_classes
        );
        Ok(network)
    }

    /// Rows in the embedding table; every token id must be below this
    pub fn embedding_rows(&self) -> usize {
        self.embedding_rows
    }

    /// Sequence length the model was trained on, when the export records it
    pub fn input_length(&self) -> Option<usize> {
        self.input_length
    }

    fn forward_record(&self, ids: &[u32], mut rng: Option<&mut (dyn RngCore + '_)>) -> std::result::Result<Vec<f32>, ShapeError> {
        let mut tensor: Option<Tensor> = None;
        for layer in &self.layers {
            tensor = Some(match (layer, tensor.take()) {
                (Layer::Embedding(emb), None) => emb.forward(ids)?,
                (Layer::Lstm(lstm), Some(t)) => lstm.forward(t, rng.as_deref_mut())?,
                (Layer::Pooling { dim }, Some(t)) => layers::global_average_pooling(t, *dim)?,
                (Layer::Dropout { rate }, Some(t)) => layers::dropout(t, *rate, rng.as_deref_mut()),
                (Layer::Dense(dense), Some(t)) => dense.forward(t)?,
                (_, _) => {
                    return Err(ShapeError::Layer {
                        layer: "embedding",
                        expected: "to be the first layer".into(),
                        actual: "a layer in another position".into(),
                    })
                }
            });
        }
        match tensor {
            Some(Tensor::Vector(v)) => Ok(v.iter().copied().collect()),
            _ => Err(ShapeError::Layer {
                layer: "output",
                expected: "a vector".into(),
                actual: "a sequence".into(),
            }),
        }
    }
}

impl SequenceClassifier for SequenceNetwork {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn forward(&self, features: &FeatureMatrix, pass: Pass<'_>) -> Result<ProbabilityMatrix> {
        if let Some(expected) = self.input_length {
            if features.rows() > 0 && features.width() != expected {
                return Err(ShapeError::Layer {
                    layer: "input",
                    expected: format!("{} tokens per record", expected),
                    actual: format!("{} tokens per record", features.width()),
                }
                .into());
            }
        }

        let rows: Vec<Vec<f32>> = match pass {
            Pass::Deterministic => (0..features.rows())
                .into_par_iter()
                .map(|i| self.forward_record(features.row(i), None))
                .collect::<std::result::Result<_, _>>()?,
            Pass::Stochastic(rng) => {
                let mut out = Vec::with_capacity(features.rows());
                for ids in features.iter_rows() {
                    out.push(self.forward_record(ids, Some(&mut *rng))?);
                }
                out
            }
        };

        let mut data = Vec::with_capacity(rows.len() * self.num_classes);
        for row in &rows {
            data.extend_from_slice(row);
        }
        Ok(ProbabilityMatrix::new(data, rows.len(), self.num_classes)?)
    }
}

// ─── validation ───────────────────────────────────────────────────────────

fn build_layer(spec: LayerSpec, flow: Flow) -> std::result::Result<(Layer, Flow), String> {
    match spec {
        LayerSpec::Embedding { .. } => Err("embedding is only allowed as the first layer".to_string()),
        LayerSpec::Lstm {
            kernel,
            recurrent_kernel,
            bias,
            dropout,
            recurrent_dropout,
            recurrent_activation,
            return_sequences,
        } => {
            let Flow::Sequence(dim) = flow else {
                return Err("lstm needs a sequence input".to_string());
            };
            let kernel = matrix("lstm kernel", &kernel)?;
            if kernel.nrows() != dim {
                return Err(format!("lstm kernel has {} rows, input width is {}", kernel.nrows(), dim));
            }
            if kernel.ncols() == 0 || kernel.ncols() % 4 != 0 {
                return Err(format!("lstm kernel width {} is not 4 * units", kernel.ncols()));
            }
            let units = kernel.ncols() / 4;
            let recurrent_kernel = matrix("lstm recurrent kernel", &recurrent_kernel)?;
            if recurrent_kernel.shape() != (units, 4 * units) {
                return Err(format!(
                    "lstm recurrent kernel is {:?}, expected ({}, {})",
                    recurrent_kernel.shape(),
                    units,
                    4 * units
                ));
            }
            if bias.len() != 4 * units {
                return Err(format!("lstm bias has {} entries, expected {}", bias.len(), 4 * units));
            }
            check_rate("lstm dropout", dropout)?;
            check_rate("lstm recurrent dropout", recurrent_dropout)?;
            let next = if return_sequences {
                Flow::Sequence(units)
            } else {
                Flow::Vector(units)
            };
            Ok((
                Layer::Lstm(Lstm {
                    kernel,
                    recurrent_kernel,
                    bias: DVector::from_vec(bias),
                    units,
                    dropout,
                    recurrent_dropout,
                    gate: recurrent_activation,
                    return_sequences,
                }),
                next,
            ))
        }
        LayerSpec::GlobalAveragePooling => match flow {
            Flow::Sequence(dim) => Ok((Layer::Pooling { dim }, Flow::Vector(dim))),
            Flow::Vector(_) => Err("global_average_pooling needs a sequence input".to_string()),
        },
        LayerSpec::Dropout { rate } => {
            check_rate("dropout", rate)?;
            Ok((Layer::Dropout { rate }, flow))
        }
        LayerSpec::Dense {
            kernel,
            bias,
            activation,
        } => {
            let Flow::Vector(dim) = flow else {
                return Err("dense needs a vector input".to_string());
            };
            let kernel = matrix("dense kernel", &kernel)?;
            if kernel.nrows() != dim {
                return Err(format!("dense kernel has {} rows, input width is {}", kernel.nrows(), dim));
            }
            if bias.len() != kernel.ncols() {
                return Err(format!(
                    "dense bias has {} entries, kernel has {} columns",
                    bias.len(),
                    kernel.ncols()
                ));
            }
            let out = kernel.ncols();
            Ok((
                Layer::Dense(Dense {
                    kernel,
                    bias: DVector::from_vec(bias),
                    activation,
                }),
                Flow::Vector(out),
            ))
        }
    }
}

fn check_rate(what: &str, rate: f32) -> std::result::Result<(), String> {
    if (0.0..1.0).contains(&rate) {
        Ok(())
    } else {
        Err(format!("{} rate {} is outside [0, 1)", what, rate))
    }
}

/// Row-major nested vectors to a matrix, rejecting ragged input
fn matrix(what: &str, rows: &[Vec<f32>]) -> std::result::Result<DMatrix<f32>, String> {
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
        return Err(format!(
            "{} row {} has {} values, expected {}",
            what,
            bad,
            rows[bad].len(),
            ncols
        ));
    }
    Ok(DMatrix::from_row_iterator(
        rows.len(),
        ncols,
        rows.iter().flat_map(|r| r.iter().copied()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::featurize::pad;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Token 1 pushes towards class 0, token 2 towards class 1
    fn toy_json(dropout: f32) -> String {
        format!(
            r#"{{
                "input_length": 4,
                "layers": [
                    {{"type": "embedding", "weights": [[0, 0], [1, 0], [0, 1]], "mask_zero": true}},
                    {{"type": "global_average_pooling"}},
                    {{"type": "dropout", "rate": {}}},
                    {{"type": "dense", "kernel": [[5, -5], [-5, 5]], "bias": [0, 0], "activation": "softmax"}}
                ]
            }}"#,
            dropout
        )
    }

    #[test]
    fn test_deterministic_forward() {
        let net = SequenceNetwork::from_json(&toy_json(0.5)).unwrap();
        assert_eq!(net.num_classes(), 2);
        assert_eq!(net.embedding_rows(), 3);

        let features = pad(&[vec![1, 1], vec![2, 2, 2]], 4);
        let probs = net.forward(&features, Pass::Deterministic).unwrap();
        assert!(probs.get(0, 0) > 0.99);
        assert!(probs.get(1, 1) > 0.99);
        for i in 0..2 {
            let sum: f32 = probs.row(i).iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_deterministic_forward_is_repeatable() {
        let net = SequenceNetwork::from_json(&toy_json(0.5)).unwrap();
        let features = pad(&[vec![1, 2], vec![2, 1, 1]], 4);
        let a = net.forward(&features, Pass::Deterministic).unwrap();
        let b = net.forward(&features, Pass::Deterministic).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stochastic_forward_depends_on_seed() {
        let net = SequenceNetwork::from_json(&toy_json(0.5)).unwrap();
        let features = pad(&[vec![1, 2, 1, 2]], 4);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a = net.forward(&features, Pass::Stochastic(&mut rng)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let b = net.forward(&features, Pass::Stochastic(&mut rng)).unwrap();
        assert_eq!(a, b);

        let sum: f32 = a.row(0).iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_lstm_network_shapes() {
        let json = r#"{
            "layers": [
                {"type": "embedding", "weights": [[0.0], [0.5], [-0.5]]},
                {"type": "lstm", "kernel": [[0.1, 0.2, 0.3, 0.4, 0.1, 0.2, 0.3, 0.4]],
                 "recurrent_kernel": [[0, 0, 0, 0, 0, 0, 0, 0], [0, 0, 0, 0, 0, 0, 0, 0]],
                 "bias": [0, 0, 0, 0, 0, 0, 0, 0], "dropout": 0.2, "recurrent_dropout": 0.2},
                {"type": "dense", "kernel": [[1, 0, -1], [0, 1, 1]], "bias": [0, 0, 0], "activation": "softmax"}
            ]
        }"#;
        let net = SequenceNetwork::from_json(json).unwrap();
        assert_eq!(net.num_classes(), 3);
        assert_eq!(net.input_length(), None);

        let features = pad(&[vec![1, 2, 1], vec![]], 5);
        let probs = net.forward(&features, Pass::Deterministic).unwrap();
        assert!(probs.check_shape(2, 3).is_ok());
        // all-padding input leaves the LSTM state at zero, so softmax of zeros
        for p in probs.row(1) {
            assert!((p - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stochastic_lstm_network_over_many_records() {
        let json = r#"{
            "layers": [
                {"type": "embedding", "weights": [[0.0, 0.0], [0.5, -0.3], [-0.5, 0.8]], "mask_zero": true},
                {"type": "lstm", "kernel": [[0.1, 0.2, 0.3, 0.4, 0.1, 0.2, 0.3, 0.4], [0.4, 0.3, 0.2, 0.1, 0.4, 0.3, 0.2, 0.1]],
                 "recurrent_kernel": [[0.2, 0, 0, 0.1, 0, 0.3, 0, 0], [0, 0.1, 0, 0, 0.2, 0, 0, 0.3]],
                 "bias": [0, 0, 0, 0, 0, 0, 0, 0], "dropout": 0.3, "recurrent_dropout": 0.3},
                {"type": "dropout", "rate": 0.2},
                {"type": "dense", "kernel": [[1, 0, -1], [0, 1, 1]], "bias": [0, 0, 0], "activation": "softmax"}
            ]
        }"#;
        let net = SequenceNetwork::from_json(json).unwrap();
        let features = pad(&[vec![1, 2, 1], vec![2, 2], vec![1]], 4);

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let a = net.forward(&features, Pass::Stochastic(&mut rng)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let b = net.forward(&features, Pass::Stochastic(&mut rng)).unwrap();
        assert_eq!(a, b);
        for i in 0..3 {
            let sum: f32 = a.row(i).iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rejects_bad_topologies() {
        let no_embedding = r#"{"layers": [{"type": "dropout", "rate": 0.1}]}"#;
        assert!(SequenceNetwork::from_json(no_embedding).is_err());

        let ends_in_sequence = r#"{"layers": [{"type": "embedding", "weights": [[1.0]]}]}"#;
        assert!(SequenceNetwork::from_json(ends_in_sequence).is_err());

        let bad_width = r#"{"layers": [
            {"type": "embedding", "weights": [[1.0, 0.0]]},
            {"type": "global_average_pooling"},
            {"type": "dense", "kernel": [[1.0]], "bias": [0.0]}
        ]}"#;
        let err = SequenceNetwork::from_json(bad_width).unwrap_err();
        assert!(err.contains("layer 2"));

        let ragged = r#"{"layers": [{"type": "embedding", "weights": [[1.0, 0.0], [1.0]]}]}"#;
        assert!(SequenceNetwork::from_json(ragged).is_err());

        let bad_rate = r#"{"layers": [
            {"type": "embedding", "weights": [[1.0]]},
            {"type": "dropout", "rate": 1.0}
        ]}"#;
        assert!(SequenceNetwork::from_json(bad_rate).is_err());
    }

    #[test]
    fn test_input_length_mismatch_is_shape_error() {
        let net = SequenceNetwork::from_json(&toy_json(0.0)).unwrap();
        let features = pad(&[vec![1]], 6);
        let err = net.forward(&features, Pass::Deterministic).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_out_of_range_token_is_shape_error() {
        let net = SequenceNetwork::from_json(&toy_json(0.0)).unwrap();
        let features = pad(&[vec![7]], 4);
        assert!(net.forward(&features, Pass::Deterministic).is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = SequenceNetwork::load(&path).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("model.json"));

        let missing = SequenceNetwork::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(missing.to_string().contains("absent.json"));
    }
}
