//! Layer math for [`SequenceNetwork`](super::SequenceNetwork)
//!
//! Weight layouts follow the Keras export: kernels are (input, output), LSTM
//! gates are packed i, f, c, o. Dropout uses inverted scaling so the
//! deterministic pass needs no correction.

use nalgebra::{DMatrix, DVector};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::ShapeError;

/// Output activation of a dense layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
    Sigmoid,
    Softmax,
}

/// Activation of the LSTM input/forget/output gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateActivation {
    #[default]
    Sigmoid,
    HardSigmoid,
}

impl GateActivation {
    fn apply(self, x: f32) -> f32 {
        match self {
            GateActivation::Sigmoid => sigmoid(x),
            GateActivation::HardSigmoid => (0.2 * x + 0.5).clamp(0.0, 1.0),
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Intermediate value flowing between layers for one record
pub(crate) enum Tensor {
    Sequence {
        steps: Vec<DVector<f32>>,
        /// `false` marks padded steps when the embedding masks zeros
        mask: Option<Vec<bool>>,
    },
    Vector(DVector<f32>),
}

impl Tensor {
    fn kind(&self) -> String {
        match self {
            Tensor::Sequence { steps, .. } => format!("a sequence of {} steps", steps.len()),
            Tensor::Vector(v) => format!("a vector of width {}", v.len()),
        }
    }
}

/// Inverted-dropout mask: kept units scaled by 1 / (1 - rate)
fn dropout_mask(rng: &mut (dyn RngCore + '_), len: usize, rate: f32) -> DVector<f32> {
    let scale = 1.0 / (1.0 - rate);
    DVector::from_fn(len, |_, _| if rng.random::<f32>() < rate { 0.0 } else { scale })
}

/// One independent mask per LSTM gate, in i, f, c, o order
fn gate_masks(rng: &mut (dyn RngCore + '_), len: usize, rate: f32) -> [DVector<f32>; 4] {
    std::array::from_fn(|_| dropout_mask(&mut *rng, len, rate))
}

pub(crate) struct Embedding {
    /// (vocabulary, dim)
    pub table: DMatrix<f32>,
    pub mask_zero: bool,
}

impl Embedding {
    pub fn forward(&self, ids: &[u32]) -> Result<Tensor, ShapeError> {
        let rows = self.table.nrows();
        let mut steps = Vec::with_capacity(ids.len());
        for &id in ids {
            if id as usize >= rows {
                return Err(ShapeError::TokenOutOfRange { id, rows });
            }
            steps.push(self.table.row(id as usize).transpose());
        }
        let mask = self
            .mask_zero
            .then(|| ids.iter().map(|&id| id != 0).collect());
        Ok(Tensor::Sequence { steps, mask })
    }
}

pub(crate) struct Lstm {
    /// (input, 4 * units)
    pub kernel: DMatrix<f32>,
    /// (units, 4 * units)
    pub recurrent_kernel: DMatrix<f32>,
    /// 4 * units
    pub bias: DVector<f32>,
    pub units: usize,
    pub dropout: f32,
    pub recurrent_dropout: f32,
    pub gate: GateActivation,
    pub return_sequences: bool,
}

impl Lstm {
    pub fn forward(&self, input: Tensor, rng: Option<&mut (dyn RngCore + '_)>) -> Result<Tensor, ShapeError> {
        let (steps, mask) = match input {
            Tensor::Sequence { steps, mask } => (steps, mask),
            other => {
                return Err(ShapeError::Layer {
                    layer: "lstm",
                    expected: "a sequence".into(),
                    actual: other.kind(),
                })
            }
        };

        let u = self.units;
        let in_dim = self.kernel.nrows();

        // Per-gate masks drawn once per record per pass, reused across time steps
        let (input_masks, recurrent_masks) = match rng {
            Some(rng) => {
                let input = if self.dropout > 0.0 {
                    Some(gate_masks(rng, in_dim, self.dropout))
                } else {
                    None
                };
                let recurrent = if self.recurrent_dropout > 0.0 {
                    Some(gate_masks(rng, u, self.recurrent_dropout))
                } else {
                    None
                };
                (input, recurrent)
            }
            None => (None, None),
        };

        let mut h = DVector::<f32>::zeros(u);
        let mut c = DVector::<f32>::zeros(u);
        let mut outputs = Vec::with_capacity(if self.return_sequences { steps.len() } else { 0 });

        for (t, x) in steps.iter().enumerate() {
            let active = mask.as_ref().map_or(true, |m| m[t]);
            if active {
                let z = if input_masks.is_none() && recurrent_masks.is_none() {
                    self.kernel.tr_mul(x) + self.recurrent_kernel.tr_mul(&h) + &self.bias
                } else {
                    self.masked_preactivation(x, &h, input_masks.as_ref(), recurrent_masks.as_ref())
                };

                let i = z.rows(0, u).map(|v| self.gate.apply(v));
                let f = z.rows(u, u).map(|v| self.gate.apply(v));
                let g = z.rows(2 * u, u).map(f32::tanh);
                let o = z.rows(3 * u, u).map(|v| self.gate.apply(v));

                c = f.component_mul(&c) + i.component_mul(&g);
                h = o.component_mul(&c.map(f32::tanh));
            }
            if self.return_sequences {
                outputs.push(h.clone());
            }
        }

        Ok(if self.return_sequences {
            Tensor::Sequence {
                steps: outputs,
                mask,
            }
        } else {
            Tensor::Vector(h)
        })
    }

    /// Gate pre-activations with each gate block seeing its own masked copy of x and h
    fn masked_preactivation(
        &self,
        x: &DVector<f32>,
        h: &DVector<f32>,
        input_masks: Option<&[DVector<f32>; 4]>,
        recurrent_masks: Option<&[DVector<f32>; 4]>,
    ) -> DVector<f32> {
        let u = self.units;
        let mut z = DVector::<f32>::zeros(4 * u);
        for gate in 0..4 {
            let x_g = match input_masks {
                Some(m) => x.component_mul(&m[gate]),
                None => x.clone(),
            };
            let h_g = match recurrent_masks {
                Some(m) => h.component_mul(&m[gate]),
                None => h.clone(),
            };
            let block = self.kernel.columns(gate * u, u).tr_mul(&x_g)
                + self.recurrent_kernel.columns(gate * u, u).tr_mul(&h_g)
                + self.bias.rows(gate * u, u);
            z.rows_mut(gate * u, u).copy_from(&block);
        }
        z
    }
}

pub(crate) struct Dense {
    /// (input, output)
    pub kernel: DMatrix<f32>,
    pub bias: DVector<f32>,
    pub activation: Activation,
}

impl Dense {
    pub fn forward(&self, input: Tensor) -> Result<Tensor, ShapeError> {
        let x = match input {
            Tensor::Vector(x) => x,
            other => {
                return Err(ShapeError::Layer {
                    layer: "dense",
                    expected: "a vector".into(),
                    actual: other.kind(),
                })
            }
        };
        let z = self.kernel.tr_mul(&x) + &self.bias;
        Ok(Tensor::Vector(activate(z, self.activation)))
    }
}

fn activate(z: DVector<f32>, activation: Activation) -> DVector<f32> {
    match activation {
        Activation::Linear => z,
        Activation::Relu => z.map(|v| v.max(0.0)),
        Activation::Tanh => z.map(f32::tanh),
        Activation::Sigmoid => z.map(sigmoid),
        Activation::Softmax => {
            let max = z.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let exp = z.map(|v| (v - max).exp());
            let sum = exp.sum();
            exp / sum
        }
    }
}

/// Mean over (unmasked) time steps; all-masked input pools to zeros
pub(crate) fn global_average_pooling(input: Tensor, dim: usize) -> Result<Tensor, ShapeError> {
    let (steps, mask) = match input {
        Tensor::Sequence { steps, mask } => (steps, mask),
        other => {
            return Err(ShapeError::Layer {
                layer: "global_average_pooling",
                expected: "a sequence".into(),
                actual: other.kind(),
            })
        }
    };
    let mut sum = DVector::<f32>::zeros(dim);
    let mut count = 0usize;
    for (t, step) in steps.iter().enumerate() {
        if mask.as_ref().map_or(true, |m| m[t]) {
            sum += step;
            count += 1;
        }
    }
    if count > 0 {
        sum /= count as f32;
    }
    Ok(Tensor::Vector(sum))
}

/// Element-wise dropout on whatever flows through; identity without a generator
pub(crate) fn dropout(input: Tensor, rate: f32, rng: Option<&mut (dyn RngCore + '_)>) -> Tensor {
    let Some(rng) = rng else {
        return input;
    };
    if rate <= 0.0 {
        return input;
    }
    match input {
        Tensor::Vector(v) => {
            let m = dropout_mask(rng, v.len(), rate);
            Tensor::Vector(v.component_mul(&m))
        }
        Tensor::Sequence { steps, mask } => {
            let steps = steps
                .into_iter()
                .map(|s| {
                    let m = dropout_mask(rng, s.len(), rate);
                    s.component_mul(&m)
                })
                .collect();
            Tensor::Sequence { steps, mask }
        }
    }
}
