//! Deterministic and MC-dropout inference over a [`SequenceClassifier`]

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::{Pass, ProbabilityMatrix, ProbabilityStack, SequenceClassifier};
use crate::error::{ConfigError, Result, ShapeError};
use crate::featurize::FeatureMatrix;

/// Seed used when the caller does not pin one
pub const DEFAULT_SEED: u64 = 42;

/// How many forward passes to run and whether dropout is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceMode {
    /// One pass with dropout disabled
    PointEstimate,
    /// `iterations` passes with dropout enabled
    Stochastic { iterations: usize, seed: u64 },
}

impl InferenceMode {
    pub fn stochastic(iterations: usize, seed: u64) -> std::result::Result<Self, ConfigError> {
        if iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(InferenceMode::Stochastic { iterations, seed })
    }
}

/// Uniform front for any classifier: checks output shapes, fans out
/// stochastic passes across the rayon pool.
#[derive(Clone)]
pub struct InferenceAdapter {
    classifier: Arc<dyn SequenceClassifier>,
    num_classes: usize,
}

impl InferenceAdapter {
    /// `num_classes` is the label count; a classifier that disagrees fails every call
    pub fn new(classifier: Arc<dyn SequenceClassifier>, num_classes: usize) -> Self {
        Self {
            classifier,
            num_classes,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn predict(&self, features: &FeatureMatrix, mode: &InferenceMode) -> Result<ProbabilityStack> {
        let batch = features.rows();
        match *mode {
            InferenceMode::PointEstimate => {
                tracing::debug!("deterministic pass over {} x {}", batch, features.width());
                let probs = self.classifier.forward(features, Pass::Deterministic)?;
                self.check(&probs, batch)?;
                Ok(ProbabilityStack::Deterministic(probs))
            }
            InferenceMode::Stochastic { iterations, seed } => {
                if iterations == 0 {
                    return Err(ConfigError::ZeroIterations.into());
                }
                tracing::debug!(
                    "{} stochastic passes over {} x {} (seed {})",
                    iterations,
                    batch,
                    features.width(),
                    seed
                );
                // Each pass owns its stream, so thread scheduling cannot change the result
                let passes = (0..iterations)
                    .into_par_iter()
                    .map(|iteration| -> Result<ProbabilityMatrix> {
                        let mut rng = ChaCha8Rng::seed_from_u64(seed);
                        rng.set_stream(iteration as u64);
                        let probs = self.classifier.forward(features, Pass::Stochastic(&mut rng))?;
                        self.check(&probs, batch)?;
                        Ok(probs)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ProbabilityStack::Stochastic(passes))
            }
        }
    }

    fn check(&self, probs: &ProbabilityMatrix, batch: usize) -> std::result::Result<(), ShapeError> {
        probs.check_shape(batch, self.num_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::featurize::pad;
    use rand::Rng;

    /// Probabilities drawn from the pass generator, for checking stream handling
    struct Noisy {
        classes: usize,
    }

    impl SequenceClassifier for Noisy {
        fn num_classes(&self) -> usize {
            self.classes
        }

        fn forward(&self, features: &FeatureMatrix, pass: Pass<'_>) -> Result<ProbabilityMatrix> {
            let mut rows = Vec::new();
            match pass {
                Pass::Deterministic => {
                    for _ in 0..features.rows() {
                        rows.push(vec![1.0 / self.classes as f32; self.classes]);
                    }
                }
                Pass::Stochastic(rng) => {
                    for _ in 0..features.rows() {
                        let a: f32 = rng.random();
                        let mut row = vec![0.0; self.classes];
                        row[0] = a;
                        row[1] = 1.0 - a;
                        rows.push(row);
                    }
                }
            }
            Ok(ProbabilityMatrix::from_rows(&rows)?)
        }
    }

    fn features() -> FeatureMatrix {
        pad(&[vec![1, 2], vec![3]], 4)
    }

    #[test]
    fn test_point_estimate_single_pass() {
        let adapter = InferenceAdapter::new(Arc::new(Noisy { classes: 2 }), 2);
        let stack = adapter.predict(&features(), &InferenceMode::PointEstimate).unwrap();
        assert_eq!(stack.iterations(), 1);
        assert_eq!(stack.batch_size(), 2);
        assert!(matches!(stack, ProbabilityStack::Deterministic(_)));
    }

    #[test]
    fn test_stochastic_stack_shape_and_reproducibility() {
        let adapter = InferenceAdapter::new(Arc::new(Noisy { classes: 2 }), 2);
        let mode = InferenceMode::stochastic(16, 7).unwrap();
        let a = adapter.predict(&features(), &mode).unwrap();
        let b = adapter.predict(&features(), &mode).unwrap();
        assert_eq!(a.iterations(), 16);
        assert_eq!(a.batch_size(), 2);
        assert_eq!(a, b);

        let ProbabilityStack::Stochastic(passes) = a else {
            panic!("expected stochastic stack");
        };
        // distinct streams give distinct passes
        assert_ne!(passes[0], passes[1]);
    }

    #[test]
    fn test_seed_changes_output() {
        let adapter = InferenceAdapter::new(Arc::new(Noisy { classes: 2 }), 2);
        let a = adapter
            .predict(&features(), &InferenceMode::stochastic(4, 1).unwrap())
            .unwrap();
        let b = adapter
            .predict(&features(), &InferenceMode::stochastic(4, 2).unwrap())
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_class_count_mismatch_is_shape_error() {
        let adapter = InferenceAdapter::new(Arc::new(Noisy { classes: 2 }), 3);
        let err = adapter
            .predict(&features(), &InferenceMode::PointEstimate)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert_eq!(InferenceMode::stochastic(0, 1), Err(ConfigError::ZeroIterations));
        let adapter = InferenceAdapter::new(Arc::new(Noisy { classes: 2 }), 2);
        let mode = InferenceMode::Stochastic {
            iterations: 0,
            seed: 1,
        };
        let err = adapter.predict(&features(), &mode).unwrap_err();
        assert!(!err.is_fatal());
    }
}
