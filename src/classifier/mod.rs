//! Sequence classifiers and the inference adapter
//!
//! A classifier takes a padded batch of token ids and returns one probability
//! vector per record over a closed set of class labels. The shipped
//! implementation is [`SequenceNetwork`], a pure-Rust evaluator for the
//! embedding / LSTM / dense networks exported as JSON. Anything else that
//! honors the [`SequenceClassifier`] contract can be plugged in instead.
//!
//! Architecture: token ids → Embedding → LSTM → Dropout → Dense(softmax)

pub mod adapter;
mod layers;
pub mod network;

pub use adapter::{InferenceAdapter, InferenceMode};
pub use layers::{Activation, GateActivation};
pub use network::{LayerSpec, SequenceNetwork};

use rand::RngCore;

use crate::error::{Result, ShapeError};
use crate::featurize::FeatureMatrix;

/// How dropout-bearing layers behave during one forward pass
pub enum Pass<'a> {
    /// Dropout disabled; the same input always gives the same output
    Deterministic,
    /// Dropout active, masks drawn from the given generator
    Stochastic(&'a mut dyn RngCore),
}

/// Black-box classifier contract
pub trait SequenceClassifier: Send + Sync {
    /// Width of every probability vector this classifier returns
    fn num_classes(&self) -> usize;

    /// Run one forward pass over the whole batch
    fn forward(&self, features: &FeatureMatrix, pass: Pass<'_>) -> Result<ProbabilityMatrix>;
}

/// Row-major (batch, classes) probabilities
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMatrix {
    data: Vec<f32>,
    rows: usize,
    classes: usize,
}

impl ProbabilityMatrix {
    pub fn new(data: Vec<f32>, rows: usize, classes: usize) -> std::result::Result<Self, ShapeError> {
        if data.len() != rows * classes {
            return Err(ShapeError::BatchSize {
                expected: rows * classes,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            rows,
            classes,
        })
    }

    /// Build from per-record vectors, which must all have the same width
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> std::result::Result<Self, ShapeError> {
        let classes = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * classes);
        for row in rows {
            let row = row.as_ref();
            if row.len() != classes {
                return Err(ShapeError::ClassCount {
                    expected: classes,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            rows: rows.len(),
            classes,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.classes..(index + 1) * self.classes]
    }

    pub fn get(&self, row: usize, class: usize) -> f32 {
        self.data[row * self.classes + class]
    }

    /// Fail unless the matrix is exactly (rows, classes)
    pub fn check_shape(&self, rows: usize, classes: usize) -> std::result::Result<(), ShapeError> {
        if self.rows != rows {
            return Err(ShapeError::BatchSize {
                expected: rows,
                actual: self.rows,
            });
        }
        if self.classes != classes {
            return Err(ShapeError::ClassCount {
                expected: classes,
                actual: self.classes,
            });
        }
        Ok(())
    }
}

/// Output of the inference adapter
#[derive(Debug, Clone, PartialEq)]
pub enum ProbabilityStack {
    /// One deterministic pass: (batch, classes)
    Deterministic(ProbabilityMatrix),
    /// One matrix per stochastic pass: (iterations, batch, classes)
    Stochastic(Vec<ProbabilityMatrix>),
}

impl ProbabilityStack {
    pub fn iterations(&self) -> usize {
        match self {
            ProbabilityStack::Deterministic(_) => 1,
            ProbabilityStack::Stochastic(passes) => passes.len(),
        }
    }

    pub fn batch_size(&self) -> usize {
        match self {
            ProbabilityStack::Deterministic(m) => m.rows(),
            ProbabilityStack::Stochastic(passes) => passes.first().map(|m| m.rows()).unwrap_or(0),
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            ProbabilityStack::Deterministic(m) => m.classes(),
            ProbabilityStack::Stochastic(passes) => {
                passes.first().map(|m| m.classes()).unwrap_or(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_from_rows() {
        let m = ProbabilityMatrix::from_rows(&[vec![0.25, 0.75], vec![1.0, 0.0]]).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.classes(), 2);
        assert_eq!(m.row(1), &[1.0, 0.0]);
        assert_eq!(m.get(0, 1), 0.75);
        assert!(m.check_shape(2, 2).is_ok());
        assert!(m.check_shape(3, 2).is_err());
        assert!(m.check_shape(2, 4).is_err());
    }

    #[test]
    fn test_matrix_rejects_ragged_rows() {
        assert!(ProbabilityMatrix::from_rows(&[vec![0.5, 0.5], vec![1.0]]).is_err());
        assert!(ProbabilityMatrix::new(vec![0.5; 3], 2, 2).is_err());
    }

    #[test]
    fn test_stack_dimensions() {
        let m = ProbabilityMatrix::from_rows(&[vec![0.5, 0.5]]).unwrap();
        let stack = ProbabilityStack::Stochastic(vec![m.clone(), m.clone(), m.clone()]);
        assert_eq!(stack.iterations(), 3);
        assert_eq!(stack.batch_size(), 1);
        assert_eq!(stack.num_classes(), 2);
        assert_eq!(ProbabilityStack::Deterministic(m).iterations(), 1);
    }
}
