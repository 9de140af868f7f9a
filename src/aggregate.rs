//! Confidence-interval aggregation over stacked forward passes
//!
//! Turns a [`ProbabilityStack`] into one prediction per record. In point mode
//! the single deterministic vector is reported as-is. In interval mode every
//! (record, class) cell gets the mean, population standard deviation and
//! linearly interpolated quantiles of its samples across passes.

use crate::classifier::{ProbabilityMatrix, ProbabilityStack};
use crate::error::{ConfigError, ShapeError};

/// Name of the predicted-class column
pub const RACE_COLUMN: &str = "race";

/// Interval coverage in (0, 1]; 1.0 selects point estimates
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ConfidenceLevel(f64);

impl ConfidenceLevel {
    pub const POINT: ConfidenceLevel = ConfidenceLevel(1.0);

    pub fn new(level: f64) -> Result<Self, ConfigError> {
        if level.is_finite() && level > 0.0 && level <= 1.0 {
            Ok(Self(level))
        } else {
            Err(ConfigError::InvalidConfidence(level))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_point_estimate(self) -> bool {
        self.0 >= 1.0
    }

    /// Fraction for the lower bound, `(1 - level) / 2`
    pub fn lower_quantile(self) -> f64 {
        (1.0 - self.0) / 2.0
    }

    /// Fraction for the upper bound, `1 - (1 - level) / 2`
    pub fn upper_quantile(self) -> f64 {
        1.0 - (1.0 - self.0) / 2.0
    }
}

impl Default for ConfidenceLevel {
    fn default() -> Self {
        Self::POINT
    }
}

/// Statistics of one class for one record across passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassSummary {
    pub mean: f64,
    pub std: f64,
    pub lb: f64,
    pub ub: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordPrediction {
    Point {
        race: usize,
        probabilities: Vec<f32>,
    },
    Interval {
        race: usize,
        summaries: Vec<ClassSummary>,
    },
}

impl RecordPrediction {
    /// Index of the predicted label
    pub fn race(&self) -> usize {
        match self {
            RecordPrediction::Point { race, .. } | RecordPrediction::Interval { race, .. } => *race,
        }
    }
}

/// Aggregated predictions in batch order, with the labels they index into
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    labels: Vec<String>,
    level: ConfidenceLevel,
    records: Vec<RecordPrediction>,
}

impl Aggregation {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn level(&self) -> ConfidenceLevel {
        self.level
    }

    pub fn records(&self) -> &[RecordPrediction] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Predicted label of the record at `index`
    pub fn race_label(&self, index: usize) -> Option<&str> {
        let record = self.records.get(index)?;
        self.labels.get(record.race()).map(String::as_str)
    }

    /// Output column names: `race`, then one column per class in point mode
    /// or `{class}_mean`, `{class}_std`, `{class}_lb`, `{class}_ub` per class
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec![RACE_COLUMN.to_string()];
        if self.level.is_point_estimate() {
            names.extend(self.labels.iter().cloned());
        } else {
            for label in &self.labels {
                for suffix in ["mean", "std", "lb", "ub"] {
                    names.push(format!("{}_{}", label, suffix));
                }
            }
        }
        names
    }

    /// Formatted values for the record at `index`, aligned with [`column_names`](Self::column_names)
    pub fn row_values(&self, index: usize) -> Vec<Option<String>> {
        let Some(record) = self.records.get(index) else {
            return vec![None; self.column_names().len()];
        };
        let mut values = vec![self.labels.get(record.race()).cloned()];
        match record {
            RecordPrediction::Point { probabilities, .. } => {
                values.extend(probabilities.iter().map(|p| Some(p.to_string())));
            }
            RecordPrediction::Interval { summaries, .. } => {
                for s in summaries {
                    for v in [s.mean, s.std, s.lb, s.ub] {
                        values.push(Some(v.to_string()));
                    }
                }
            }
        }
        values
    }
}

/// Aggregate a probability stack into per-record predictions
pub fn aggregate(
    stack: &ProbabilityStack,
    labels: &[String],
    level: ConfidenceLevel,
) -> Result<Aggregation, ShapeError> {
    let classes = labels.len();
    let records = match stack {
        ProbabilityStack::Deterministic(probs) => {
            probs.check_shape(probs.rows(), classes)?;
            if level.is_point_estimate() {
                (0..probs.rows())
                    .map(|i| {
                        let row = probs.row(i);
                        RecordPrediction::Point {
                            race: argmax(row.iter().map(|&p| f64::from(p))),
                            probabilities: row.to_vec(),
                        }
                    })
                    .collect()
            } else {
                summarize(std::slice::from_ref(probs), classes, level)
            }
        }
        ProbabilityStack::Stochastic(passes) => {
            if level.is_point_estimate() {
                return Err(ShapeError::StochasticStackForPointEstimate {
                    iterations: passes.len(),
                });
            }
            let first = passes.first().ok_or(ShapeError::EmptyStack)?;
            for pass in passes {
                pass.check_shape(first.rows(), classes)?;
            }
            summarize(passes, classes, level)
        }
    };

    Ok(Aggregation {
        labels: labels.to_vec(),
        level,
        records,
    })
}

fn summarize(passes: &[ProbabilityMatrix], classes: usize, level: ConfidenceLevel) -> Vec<RecordPrediction> {
    let rows = passes.first().map(|p| p.rows()).unwrap_or(0);
    let mut samples = Vec::with_capacity(passes.len());
    (0..rows)
        .map(|row| {
            let summaries: Vec<ClassSummary> = (0..classes)
                .map(|class| {
                    samples.clear();
                    samples.extend(passes.iter().map(|p| f64::from(p.get(row, class))));
                    let (mean, variance) = mean_variance(&samples);
                    samples.sort_by(f64::total_cmp);
                    ClassSummary {
                        mean,
                        std: variance.sqrt(),
                        lb: quantile(&samples, level.lower_quantile()),
                        ub: quantile(&samples, level.upper_quantile()),
                    }
                })
                .collect();
            RecordPrediction::Interval {
                race: argmax(summaries.iter().map(|s| s.mean)),
                summaries,
            }
        })
        .collect()
}

/// Mean and population variance (Welford)
fn mean_variance(values: &[f64]) -> (f64, f64) {
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    let mut count = 0.0f64;
    for &x in values {
        count += 1.0;
        let delta = x - mean;
        mean += delta / count;
        m2 += delta * (x - mean);
    }
    if count == 0.0 {
        (0.0, 0.0)
    } else {
        (mean, m2 / count)
    }
}

/// Quantile of sorted values with linear interpolation at `q * (n - 1)`
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Index of the largest value; ties keep the first
fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}
