//! Census last-name lookup
//!
//! Joins normalized last names against the aggregated census surname tables.
//! The reference key is unique by construction, so the join never changes
//! the row count.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::cache::ReferenceCache;
use crate::error::{ConfigError, ResourceError, Result};
use crate::normalize::{normalize, Casing};
use crate::records::{open_csv, ColumnSelector, RecordBatch};

/// Percentage columns appended by a lookup, in output order
pub const CENSUS_COLUMNS: [&str; 6] = [
    "pctwhite",
    "pctblack",
    "pctapi",
    "pctaian",
    "pct2prace",
    "pcthispanic",
];

/// Key column of the reference CSV
const NAME_COLUMN: &str = "name";

/// Marker the census uses for suppressed small counts
const SUPPRESSED: &str = "(S)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum CensusYear {
    #[default]
    Y2000,
    Y2010,
}

impl CensusYear {
    pub const ALL: [CensusYear; 2] = [CensusYear::Y2000, CensusYear::Y2010];

    pub fn year(self) -> u16 {
        match self {
            CensusYear::Y2000 => 2000,
            CensusYear::Y2010 => 2010,
        }
    }

    /// File name of the reference table under the data directory
    pub fn file_name(self) -> String {
        format!("census_{}.csv", self.year())
    }

    /// Reference table location under a data root
    pub fn path_in(self, data_dir: &Path) -> PathBuf {
        data_dir.join("census").join(self.file_name())
    }
}

impl TryFrom<u16> for CensusYear {
    type Error = ConfigError;

    fn try_from(year: u16) -> std::result::Result<Self, Self::Error> {
        match year {
            2000 => Ok(CensusYear::Y2000),
            2010 => Ok(CensusYear::Y2010),
            other => Err(ConfigError::UnsupportedCensusYear(other)),
        }
    }
}

impl FromStr for CensusYear {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let year: u16 = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::UnsupportedCensusYear(0))?;
        CensusYear::try_from(year)
    }
}

impl fmt::Display for CensusYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.year())
    }
}

/// Upper-cased surname → percentages (missing when suppressed)
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    index: FxHashMap<String, usize>,
    values: Vec<[Option<f64>; 6]>,
}

impl ReferenceTable {
    /// Build from `(name, percentages)` rows; first occurrence of a name wins
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, [Option<f64>; 6])>,
    {
        let mut table = Self::default();
        for (name, pcts) in rows {
            table.insert(name, pcts);
        }
        table
    }

    fn insert(&mut self, name: String, pcts: [Option<f64>; 6]) -> bool {
        let key = normalize(&name, Casing::Upper);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.values.len());
        self.values.push(pcts);
        true
    }

    /// Load a census surname CSV. Rows without a name are dropped.
    pub fn load(path: &Path) -> Result<Self> {
        let csv_err = |source| ResourceError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut rdr = open_csv(path)?;
        let headers = rdr.headers().map_err(csv_err)?.clone();
        let find = |column: &'static str| {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| ResourceError::MissingArtifactColumn {
                    path: path.to_path_buf(),
                    column,
                })
        };
        let name_col = find(NAME_COLUMN)?;
        let mut pct_cols = [0usize; 6];
        for (slot, column) in pct_cols.iter_mut().zip(CENSUS_COLUMNS) {
            *slot = find(column)?;
        }

        let mut table = Self::default();
        let mut missing = 0usize;
        let mut duplicates = 0usize;
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            let name = record.get(name_col).unwrap_or_default();
            if name.trim().is_empty() {
                missing += 1;
                continue;
            }
            let mut pcts = [None; 6];
            for (value, &col) in pcts.iter_mut().zip(&pct_cols) {
                *value = parse_percentage(record.get(col).unwrap_or_default());
            }
            if !table.insert(name.to_string(), pcts) {
                duplicates += 1;
            }
        }

        if missing > 0 {
            tracing::warn!("dropped {} census rows without a name from {}", missing, path.display());
        }
        if duplicates > 0 {
            tracing::warn!(
                "ignored {} duplicate census names in {} (first occurrence kept)",
                duplicates,
                path.display()
            );
        }
        if table.is_empty() {
            return Err(ResourceError::EmptyArtifact {
                path: path.to_path_buf(),
            }
            .into());
        }
        tracing::info!("loaded {} census surnames from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Percentages for a surname, normalized the same way as the keys
    pub fn get(&self, name: &str) -> Option<&[Option<f64>; 6]> {
        let key = normalize(name, Casing::Upper);
        self.index.get(&key).map(|&i| &self.values[i])
    }
}

fn parse_percentage(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == SUPPRESSED {
        return None;
    }
    raw.parse().ok()
}

/// Left-join census percentages onto `records` by the last-name column.
///
/// The key column is left untouched; unmatched and missing names get empty
/// percentage columns.
pub fn lookup(records: RecordBatch, last: &ColumnSelector, table: &ReferenceTable) -> Result<RecordBatch> {
    let column = records.resolve(last)?;

    let mut matched = 0usize;
    let values: Vec<Vec<Option<String>>> = records
        .column_values(column)
        .map(|name| match name.and_then(|n| table.get(n)) {
            Some(pcts) => {
                matched += 1;
                pcts.iter().map(|v| v.map(|p| p.to_string())).collect()
            }
            None => vec![None; CENSUS_COLUMNS.len()],
        })
        .collect();

    tracing::debug!("census lookup matched {} of {} rows", matched, records.len());
    let names = CENSUS_COLUMNS.iter().map(|c| c.to_string()).collect();
    Ok(records.append_columns(names, values))
}

/// Census tables under a data directory, loaded once per year
pub struct CensusData {
    data_dir: PathBuf,
    cache: ReferenceCache,
}

impl CensusData {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: ReferenceCache::new(),
        }
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    pub fn table(&self, year: CensusYear) -> Result<Arc<ReferenceTable>> {
        self.cache
            .get_or_try_load(&year, |y| ReferenceTable::load(&y.path_in(&self.data_dir)))
    }

    /// Resolve the column, then load the year's table and join it
    pub fn lookup(&self, records: RecordBatch, last: &ColumnSelector, year: CensusYear) -> Result<RecordBatch> {
        records.resolve(last)?;
        let table = self.table(year)?;
        lookup(records, last, &table)
    }
}
