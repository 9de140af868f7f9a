//! Catalog of the shipped sequence models
//!
//! Each [`ModelKind`] fixes the artifact file names, the n-gram window, the
//! padded feature length and which name columns feed the model. Paths are
//! relative to the model directory.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::artifacts::ModelArtifacts;
use crate::error::ConfigError;
use crate::ngram::NgramWidth;

/// Stochastic passes used when the caller does not choose
pub const DEFAULT_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    CensusLastName,
    WikiLastName,
    WikiFullName,
    FloridaLastName,
    FloridaFullName,
    FloridaLastNameFiveCat,
    FloridaFullNameFiveCat,
    FloridaLastNameUncertainty,
    NorthCarolinaFullName,
}

/// Which input columns a model reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameInput {
    /// Last name alone
    LastName,
    /// `"last first"`
    FullName,
}

/// Everything needed to run one model configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub model_file: String,
    pub vocabulary_file: String,
    pub labels_file: String,
    pub width: NgramWidth,
    pub feature_len: usize,
    pub input: NameInput,
    pub year: Option<u16>,
    pub default_confidence: f64,
}

impl ModelSpec {
    pub fn artifacts(&self, model_dir: &Path) -> ModelArtifacts {
        ModelArtifacts::in_dir(model_dir, &self.model_file, &self.vocabulary_file, &self.labels_file)
    }
}

impl ModelKind {
    pub const ALL: [ModelKind; 9] = [
        ModelKind::CensusLastName,
        ModelKind::WikiLastName,
        ModelKind::WikiFullName,
        ModelKind::FloridaLastName,
        ModelKind::FloridaFullName,
        ModelKind::FloridaLastNameFiveCat,
        ModelKind::FloridaFullNameFiveCat,
        ModelKind::FloridaLastNameUncertainty,
        ModelKind::NorthCarolinaFullName,
    ];

    /// Name used on the command line
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::CensusLastName => "census-ln",
            ModelKind::WikiLastName => "wiki-ln",
            ModelKind::WikiFullName => "wiki-name",
            ModelKind::FloridaLastName => "fl-reg-ln",
            ModelKind::FloridaFullName => "fl-reg-name",
            ModelKind::FloridaLastNameFiveCat => "fl-reg-ln-five-cat",
            ModelKind::FloridaFullNameFiveCat => "fl-reg-name-five-cat",
            ModelKind::FloridaLastNameUncertainty => "fl-reg-ln-uncertainty",
            ModelKind::NorthCarolinaFullName => "nc-reg-name",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ModelKind::CensusLastName => "Census surname LSTM (last name)",
            ModelKind::WikiLastName => "Wikipedia LSTM (last name)",
            ModelKind::WikiFullName => "Wikipedia LSTM (full name)",
            ModelKind::FloridaLastName => "Florida voter registration LSTM (last name)",
            ModelKind::FloridaFullName => "Florida voter registration LSTM (full name)",
            ModelKind::FloridaLastNameFiveCat => "Florida voter registration, 5 categories (last name)",
            ModelKind::FloridaFullNameFiveCat => "Florida voter registration, 5 categories (full name)",
            ModelKind::FloridaLastNameUncertainty => {
                "Florida voter registration LSTM with confidence intervals (last name)"
            }
            ModelKind::NorthCarolinaFullName => "North Carolina voter registration, 12 categories (full name)",
        }
    }

    pub fn input(self) -> NameInput {
        match self {
            ModelKind::CensusLastName
            | ModelKind::WikiLastName
            | ModelKind::FloridaLastName
            | ModelKind::FloridaLastNameFiveCat
            | ModelKind::FloridaLastNameUncertainty => NameInput::LastName,
            ModelKind::WikiFullName
            | ModelKind::FloridaFullName
            | ModelKind::FloridaFullNameFiveCat
            | ModelKind::NorthCarolinaFullName => NameInput::FullName,
        }
    }

    /// Years with trained artifacts; empty when the model is not versioned
    pub fn supported_years(self) -> &'static [u16] {
        match self {
            ModelKind::CensusLastName => &[2000, 2010],
            ModelKind::NorthCarolinaFullName => &[2017],
            _ => &[],
        }
    }

    pub fn default_year(self) -> Option<u16> {
        match self {
            ModelKind::CensusLastName => Some(2010),
            ModelKind::NorthCarolinaFullName => Some(2017),
            _ => None,
        }
    }

    pub fn default_confidence(self) -> f64 {
        match self {
            ModelKind::FloridaLastNameUncertainty | ModelKind::FloridaFullNameFiveCat => 0.9,
            _ => 1.0,
        }
    }

    /// Resolve artifact names and encoding parameters for a year
    pub fn resolve(self, year: Option<u16>) -> Result<ModelSpec, ConfigError> {
        let supported = self.supported_years();
        let year = match year {
            Some(y) if supported.contains(&y) => Some(y),
            Some(y) => {
                return Err(ConfigError::UnsupportedYear {
                    model: self.name(),
                    year: y,
                    supported,
                })
            }
            None => self.default_year(),
        };

        let (dir, model, vocab, labels) = match self {
            ModelKind::CensusLastName => {
                let y = year.unwrap_or(2010);
                return Ok(self.spec(
                    format!("census/lstm/census{}_ln_lstm.json", y),
                    format!("census/lstm/census{}_ln_vocab.csv", y),
                    format!("census/lstm/census{}_race.csv", y),
                    year,
                ));
            }
            ModelKind::WikiLastName => ("wiki/lstm", "wiki_ln_lstm", "wiki_ln_vocab", "wiki_race"),
            ModelKind::WikiFullName => ("wiki/lstm", "wiki_name_lstm", "wiki_name_vocab", "wiki_race"),
            ModelKind::FloridaLastName => ("fl_voter_reg/lstm", "fl_all_ln_lstm", "fl_all_ln_vocab", "fl_race"),
            ModelKind::FloridaFullName => {
                ("fl_voter_reg/lstm", "fl_all_name_lstm", "fl_all_name_vocab", "fl_race")
            }
            ModelKind::FloridaLastNameFiveCat => (
                "fl_voter_reg/lstm",
                "fl_all_ln_lstm_5_cat",
                "fl_all_ln_vocab_5_cat",
                "fl_race_five_cat",
            ),
            ModelKind::FloridaFullNameFiveCat => (
                "fl_voter_reg/lstm",
                "fl_all_fullname_lstm_5_cat",
                "fl_all_fullname_vocab_5_cat",
                "fl_name_five_cat_race",
            ),
            ModelKind::FloridaLastNameUncertainty => (
                "fl_voter_reg/lstm",
                "fl_all_ln_lstm_uncrtn",
                "fl_all_ln_vocab",
                "fl_ln_race",
            ),
            ModelKind::NorthCarolinaFullName => (
                "nc_voter_reg/lstm",
                "nc_voter_name_lstm_oversample",
                "nc_voter_name_vocab_oversample",
                "nc_name_race",
            ),
        };

        Ok(self.spec(
            format!("{}/{}.json", dir, model),
            format!("{}/{}.csv", dir, vocab),
            format!("{}/{}.csv", dir, labels),
            year,
        ))
    }

    fn spec(self, model_file: String, vocabulary_file: String, labels_file: String, year: Option<u16>) -> ModelSpec {
        let (width, feature_len) = match self {
            ModelKind::WikiFullName | ModelKind::FloridaFullName => (NgramWidth::Fixed(2), 25),
            ModelKind::NorthCarolinaFullName => (NgramWidth::Range { lo: 2, hi: 3 }, 25),
            _ => (NgramWidth::Fixed(2), 20),
        };
        ModelSpec {
            kind: self,
            model_file,
            vocabulary_file,
            labels_file,
            width,
            feature_len,
            input: self.input(),
            year,
            default_confidence: self.default_confidence(),
        }
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        ModelKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownModel(s.to_string()))
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
