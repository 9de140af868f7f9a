//! End-to-end prediction against the fixture models
//!
//! The fixture network embeds the n-grams of "Smith" toward `white` and those
//! of "Zhang" toward `api`, with a dropout layer before the output so the
//! stochastic path has something to vary.

use std::path::{Path, PathBuf};

use ethnicolr::catalog::ModelKind;
use ethnicolr::predict::{PredictRequest, Predictor};
use ethnicolr::records::RecordBatch;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn predictor() -> Predictor {
    Predictor::new(fixtures().join("models"))
}

fn names() -> RecordBatch {
    RecordBatch::from_path(&fixtures().join("names.csv"), true).unwrap()
}

fn parse(batch: &RecordBatch, row: usize, column: &str) -> f64 {
    batch
        .get(row, column)
        .unwrap_or_else(|| panic!("row {} has no {}", row, column))
        .parse()
        .unwrap()
}

#[test]
fn test_point_estimate_matches_true_race() {
    let request = PredictRequest::new(ModelKind::CensusLastName, "last").year(2000);
    let out = predictor().predict(names(), &request).unwrap();

    assert_eq!(out.len(), 2);
    for row in 0..out.len() {
        assert_eq!(out.get(row, "race"), out.get(row, "true_race"));
    }
    // input columns come first and are untouched
    assert_eq!(&out.columns()[..3], ["last", "first", "true_race"]);
    assert_eq!(&out.columns()[3..], ["race", "api", "black", "hispanic", "white"]);
}

#[test]
fn test_point_probabilities_sum_to_one() {
    let request = PredictRequest::new(ModelKind::CensusLastName, "last").year(2000);
    let out = predictor().predict(names(), &request).unwrap();

    for row in 0..out.len() {
        let total: f64 = ["api", "black", "hispanic", "white"]
            .iter()
            .map(|c| parse(&out, row, c))
            .sum();
        assert!((total - 1.0).abs() < 1e-6, "row {} sums to {}", row, total);
    }
    assert!(parse(&out, 0, "white") > 0.99);
    assert!(parse(&out, 1, "api") > 0.99);
}

#[test]
fn test_point_estimate_is_deterministic() {
    let request = PredictRequest::new(ModelKind::CensusLastName, "last").year(2000);
    let p = predictor();
    let first = p.predict(names(), &request).unwrap();
    let second = p.predict(names(), &request).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_interval_estimate_brackets_mean() {
    let request = PredictRequest::new(ModelKind::CensusLastName, "last")
        .year(2000)
        .confidence(0.9)
        .iterations(100);
    let out = predictor().predict(names(), &request).unwrap();

    assert!(out.columns().contains(&"white_mean".to_string()));
    assert!(out.columns().contains(&"api_ub".to_string()));
    for row in 0..out.len() {
        assert_eq!(out.get(row, "race"), out.get(row, "true_race"));

        let means: f64 = ["api", "black", "hispanic", "white"]
            .iter()
            .map(|c| parse(&out, row, &format!("{}_mean", c)))
            .sum();
        assert!((means - 1.0).abs() < 0.1);

        let race = out.get(row, "race").unwrap().to_string();
        let mean = parse(&out, row, &format!("{}_mean", race));
        let lb = parse(&out, row, &format!("{}_lb", race));
        let ub = parse(&out, row, &format!("{}_ub", race));
        assert!(lb <= mean && mean <= ub, "{} <= {} <= {}", lb, mean, ub);
        assert!(parse(&out, row, &format!("{}_std", race)) > 0.0);
    }
}

#[test]
fn test_interval_estimate_repeats_with_same_seed() {
    let request = PredictRequest::new(ModelKind::CensusLastName, "last")
        .year(2000)
        .confidence(0.9)
        .iterations(20)
        .seed(7);
    let p = predictor();
    let first = p.predict(names(), &request).unwrap();
    let second = p.predict(names(), &request).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_single_iteration_has_zero_spread() {
    let request = PredictRequest::new(ModelKind::CensusLastName, "last")
        .year(2000)
        .confidence(0.9)
        .iterations(1);
    let out = predictor().predict(names(), &request).unwrap();

    for row in 0..out.len() {
        for class in ["api", "black", "hispanic", "white"] {
            assert_eq!(parse(&out, row, &format!("{}_std", class)), 0.0);
            let mean = parse(&out, row, &format!("{}_mean", class));
            assert_eq!(parse(&out, row, &format!("{}_lb", class)), mean);
            assert_eq!(parse(&out, row, &format!("{}_ub", class)), mean);
        }
    }
}

#[test]
fn test_full_name_model() {
    let request = PredictRequest::new(ModelKind::WikiFullName, "last")
        .first("first")
        .confidence(1.0);
    let out = predictor().predict(names(), &request).unwrap();
    assert_eq!(out.get(0, "race"), Some("white"));
    assert_eq!(out.get(1, "race"), Some("api"));
}

#[test]
fn test_rows_without_names_keep_their_place() {
    let records = RecordBatch::from_str_rows(
        &["last"],
        &[&["smith"], &[""], &["ZHANG"], &["   "]],
    )
    .unwrap();
    let request = PredictRequest::new(ModelKind::CensusLastName, "last").year(2000);
    let p = predictor();

    let table = p.predict_table(&records, &request).unwrap();
    assert_eq!(table.row_ids(), [0, 2]);
    assert_eq!(table.skipped(), 2);
    assert_eq!(table.race_for_row(2), Some("api"));
    assert_eq!(table.race_for_row(1), None);

    let out = table.join(records);
    assert_eq!(out.len(), 4);
    assert_eq!(out.get(0, "race"), Some("white"));
    assert_eq!(out.get(1, "race"), None);
    assert_eq!(out.get(1, "white"), None);
    assert_eq!(out.get(2, "race"), Some("api"));
    assert_eq!(out.get(3, "race"), None);
}

#[test]
fn test_positional_columns() {
    let input = "smith,john\nzhang,simon\n";
    let records = RecordBatch::from_reader(input.as_bytes(), false).unwrap();
    let request = PredictRequest::new(ModelKind::WikiFullName, "0").first("1");
    let out = predictor().predict(records, &request).unwrap();
    assert_eq!(out.get(0, "col0"), Some("smith"));
    assert_eq!(out.get(0, "race"), Some("white"));
    assert_eq!(out.get(1, "race"), Some("api"));
}

#[test]
fn test_models_are_loaded_once() {
    let p = predictor();
    let request = PredictRequest::new(ModelKind::CensusLastName, "last").year(2000);
    p.predict(names(), &request).unwrap();
    p.predict(names(), &request).unwrap();
    assert_eq!(p.cache().len(), 1);

    let spec = ModelKind::CensusLastName.resolve(Some(2000)).unwrap();
    let artifacts = spec.artifacts(p.model_dir());
    let loaded = p.cache().get(&artifacts).unwrap();
    assert_eq!(loaded.labels(), ["api", "black", "hispanic", "white"]);

    p.cache().invalidate(&artifacts);
    assert!(p.cache().is_empty());
    p.predict(names(), &request).unwrap();
    assert_eq!(p.cache().len(), 1);
}

#[test]
fn test_missing_model_year_is_resource_error() {
    // only the 2000 census model ships with the fixtures
    let request = PredictRequest::new(ModelKind::CensusLastName, "last").year(2010);
    let err = predictor().predict(names(), &request).unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("census2010"));
}

/// Runs against real exported models when `ETHNICOLR_MODEL_DIR` points at them
#[test]
#[ignore]
fn test_exported_census_model() {
    let dir = std::env::var("ETHNICOLR_MODEL_DIR").expect("ETHNICOLR_MODEL_DIR not set");
    let records = RecordBatch::from_str_rows(&["last"], &[&["smith"], &["zhang"]]).unwrap();
    let request = PredictRequest::new(ModelKind::CensusLastName, "last").year(2010);
    let out = Predictor::new(dir).predict(records, &request).unwrap();
    assert_eq!(out.get(0, "race"), Some("white"));
    assert_eq!(out.get(1, "race"), Some("api"));
}
