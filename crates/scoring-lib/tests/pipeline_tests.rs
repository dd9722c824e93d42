//! End-to-end tests for the scoring pipeline

use scoring_lib::config::{DemoOverrideConfig, ScoringConfig};
use scoring_lib::dataset::column_names;
use scoring_lib::model::{Estimator, ObjectModel, ObliviousTree, Split, TreeEnsemble};
use scoring_lib::predictor::FeatureSource;
use scoring_lib::{read_result_table, ScoreRequest, ScoringError, ScoringOutput, ScoringService};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const GENERAL_CSV: &str = "\
age,income,tenure,notes
25,30000,3,new
41,52000,24,loyal
33,41000,6,
58,87000,48,vip
29,35000,11,trial
";

/// Churns when tenure is at most 12 months
fn tenure_ensemble() -> TreeEnsemble {
    TreeEnsemble {
        feature_names: vec!["age".into(), "income".into(), "tenure".into()],
        bias: 0.0,
        trees: vec![ObliviousTree {
            splits: vec![Split {
                feature_index: 2,
                threshold: 12.0,
            }],
            leaf_values: vec![1.0, -1.0],
        }],
    }
}

fn logistic_object(names: Option<Vec<String>>) -> ObjectModel {
    ObjectModel {
        feature_names_in: names,
        estimator: Estimator::LogisticRegression {
            coef: vec![0.0, 0.0, -0.2],
            intercept: 1.0,
        },
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("models")).unwrap();
        Self { dir }
    }

    fn write_model(&self, file_name: &str, bytes: &[u8]) {
        fs::write(self.dir.path().join("models").join(file_name), bytes).unwrap();
    }

    fn write_input(&self, file_name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(file_name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn config(&self, models: &[(&str, &str)]) -> ScoringConfig {
        ScoringConfig {
            models_dir: self.dir.path().join("models"),
            models: models
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            demo_override: None,
            ..ScoringConfig::default()
        }
    }
}

fn string_column(frame: &polars::prelude::DataFrame, name: &str) -> Vec<Option<String>> {
    frame
        .column(name)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

fn label_column(frame: &polars::prelude::DataFrame, name: &str) -> Vec<i64> {
    frame
        .column(name)
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}

#[test]
fn test_general_model_scores_and_persists() {
    let fx = Fixture::new();
    fx.write_model("catboost_model.cbm", &tenure_ensemble().to_bytes());
    let input = fx.write_input("customers.csv", GENERAL_CSV);
    let service = ScoringService::new(fx.config(&[("General", "catboost_model.cbm")])).unwrap();

    let outcome = service
        .score(&ScoreRequest::new("General", &input).with_output_dir(fx.output_dir()))
        .unwrap();

    assert_eq!(outcome.model, "General");
    assert_eq!(outcome.rows, 5);
    assert_eq!(outcome.features.source, FeatureSource::NativeIntrospection);
    assert!(!outcome.low_confidence);
    assert!(!outcome.fallback_used);
    assert!(outcome.probability_available);
    assert!(outcome.override_applied.is_none());
    assert_eq!(outcome.class_distribution.get(&1), Some(&3));
    assert_eq!(outcome.class_distribution.get(&0), Some(&2));

    let written = match &outcome.output {
        ScoringOutput::Written(path) => path.clone(),
        ScoringOutput::Table(_) => panic!("expected a persisted table"),
    };
    assert_eq!(written, fx.output_dir().join("predicted.csv"));

    let table = read_result_table(&written).unwrap();
    assert_eq!(
        column_names(&table),
        vec!["User_ID", "age", "income", "tenure", "notes", "Predicted_Target", "churn_probability"]
    );
    assert_eq!(table.height(), 5);
    assert_eq!(
        string_column(&table, "User_ID"),
        ["U0001", "U0002", "U0003", "U0004", "U0005"]
            .iter()
            .map(|s| Some(s.to_string()))
            .collect::<Vec<_>>()
    );
    assert_eq!(label_column(&table, "Predicted_Target"), vec![1, 0, 1, 0, 1]);
    assert_eq!(string_column(&table, "notes")[1], Some("loyal".to_string()));

    let probabilities = table.column("churn_probability").unwrap().f64().unwrap();
    for p in probabilities.into_iter().flatten() {
        assert!((0.0..=1.0).contains(&p));
    }
}

#[test]
fn test_missing_features_reported_together() {
    let fx = Fixture::new();
    fx.write_model("catboost_model.cbm", &tenure_ensemble().to_bytes());
    let input = fx.write_input("partial.csv", "age,income,notes\n30,1000,x\n");
    let service = ScoringService::new(fx.config(&[("General", "catboost_model.cbm")])).unwrap();

    let err = service
        .score(&ScoreRequest::new("General", &input).with_output_dir(fx.output_dir()))
        .unwrap_err();
    match err {
        ScoringError::MissingFeatures { missing } => assert_eq!(missing, vec!["tenure".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fx.output_dir().join("predicted.csv").exists());
}

#[test]
fn test_mislabelled_native_artifact_falls_back_to_object() {
    let fx = Fixture::new();
    let names = vec!["age".to_string(), "income".to_string(), "tenure".to_string()];
    let object = logistic_object(Some(names)).to_bytes();
    fx.write_model("life.cbm", &object);
    fx.write_model("life.joblib", &object);
    let input = fx.write_input("customers.csv", GENERAL_CSV);
    let service = ScoringService::new(fx.config(&[("Fallback", "life.cbm"), ("Direct", "life.joblib")])).unwrap();

    let via_fallback = service.score(&ScoreRequest::new("Fallback", &input)).unwrap();
    let direct = service.score(&ScoreRequest::new("Direct", &input)).unwrap();

    assert!(via_fallback.fallback_used);
    assert!(!direct.fallback_used);
    assert_eq!(via_fallback.features.source, FeatureSource::ObjectIntrospection);

    match (&via_fallback.output, &direct.output) {
        (ScoringOutput::Table(a), ScoringOutput::Table(b)) => assert!(a.equals_missing(b)),
        _ => panic!("expected in-memory tables"),
    }
}

#[test]
fn test_corrupt_artifact_lists_both_attempts() {
    let fx = Fixture::new();
    fx.write_model("broken.cbm", b"definitely not a model");
    let input = fx.write_input("customers.csv", GENERAL_CSV);
    let service = ScoringService::new(fx.config(&[("Broken", "broken.cbm")])).unwrap();

    let err = service.score(&ScoreRequest::new("Broken", &input)).unwrap_err();
    match err {
        ScoringError::CorruptModel { attempts, .. } => assert_eq!(attempts.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_probability_column_follows_model_support() {
    let fx = Fixture::new();
    let svc = ObjectModel {
        feature_names_in: Some(vec!["age".into(), "tenure".into()]),
        estimator: Estimator::LinearSvc {
            coef: vec![0.0, -1.0],
            intercept: 10.0,
        },
    };
    fx.write_model("svc.joblib", &svc.to_bytes());
    let input = fx.write_input("customers.csv", GENERAL_CSV);
    let service = ScoringService::new(fx.config(&[("Svc", "svc.joblib")])).unwrap();

    let outcome = service.score(&ScoreRequest::new("Svc", &input)).unwrap();
    assert!(!outcome.probability_available);
    match outcome.output {
        ScoringOutput::Table(table) => {
            assert!(!column_names(&table).contains(&"churn_probability".to_string()));
            assert_eq!(label_column(&table, "Predicted_Target"), vec![1, 0, 1, 0, 0]);
        }
        ScoringOutput::Written(_) => panic!("expected an in-memory table"),
    }
}

#[test]
fn test_heuristic_resolution_is_flagged_or_rejected() {
    let fx = Fixture::new();
    fx.write_model("auto.joblib", &logistic_object(None).to_bytes());
    let input = fx.write_input("ids.csv", "ID,age,income,tenure,Target\n1,30,100,5,0\n2,50,900,40,1\n");

    let mut config = fx.config(&[("Automobile_Insurance", "auto.joblib")]);
    let outcome = ScoringService::new(config.clone())
        .unwrap()
        .score(&ScoreRequest::new("Automobile_Insurance", &input))
        .unwrap();
    assert!(outcome.low_confidence);
    assert_eq!(outcome.features.source, FeatureSource::Heuristic);
    assert_eq!(
        outcome.features.features.names(),
        &["age".to_string(), "income".to_string(), "tenure".to_string()][..]
    );

    config.allow_heuristic_features = false;
    let err = ScoringService::new(config)
        .unwrap()
        .score(&ScoreRequest::new("Automobile_Insurance", &input))
        .unwrap_err();
    assert_eq!(err.kind(), "low_confidence_rejected");
}

fn demo_config(fx: &Fixture) -> ScoringConfig {
    let mut config = fx.config(&[("Life_Insurance", "life.joblib"), ("General", "general.cbm")]);
    config.demo_override = Some(DemoOverrideConfig {
        enabled: true,
        model: "Life_Insurance".into(),
        min_rate: 0.20,
        max_rate: 0.30,
    });
    config
}

fn many_rows(n: usize) -> String {
    let mut csv = String::from("age,income,tenure\n");
    for i in 0..n {
        csv.push_str(&format!("{},{},{}\n", 20 + i % 50, 1000 * i, i % 60));
    }
    csv
}

fn labels_of(outcome: &scoring_lib::ScoringOutcome) -> Vec<i64> {
    match &outcome.output {
        ScoringOutput::Table(table) => label_column(table, "Predicted_Target"),
        ScoringOutput::Written(path) => label_column(&read_result_table(path).unwrap(), "Predicted_Target"),
    }
}

#[test]
fn test_demo_override_is_deterministic_per_path() {
    let fx = Fixture::new();
    let names = vec!["age".to_string(), "income".to_string(), "tenure".to_string()];
    fx.write_model("life.joblib", &logistic_object(Some(names)).to_bytes());
    let input = fx.write_input("upload_a.csv", &many_rows(200));
    let service = ScoringService::new(demo_config(&fx)).unwrap();

    let first = service.score(&ScoreRequest::new("Life_Insurance", &input)).unwrap();
    let second = service.score(&ScoreRequest::new("Life_Insurance", &input)).unwrap();

    assert_eq!(first.override_applied.as_deref(), Some("demo_churn"));
    assert_eq!(labels_of(&first), labels_of(&second));

    let positives = first.class_distribution.get(&1).copied().unwrap_or(0);
    assert!((40..=60).contains(&positives), "positives = {positives}");
    // Model probabilities survive the override
    assert!(first.probability_available);
}

#[test]
fn test_demo_override_does_not_touch_other_models() {
    let fx = Fixture::new();
    fx.write_model("general.cbm", &tenure_ensemble().to_bytes());
    let input = fx.write_input("customers.csv", GENERAL_CSV);
    let service = ScoringService::new(demo_config(&fx)).unwrap();

    let outcome = service.score(&ScoreRequest::new("General", &input)).unwrap();
    assert!(outcome.override_applied.is_none());
    assert_eq!(labels_of(&outcome), vec![1, 0, 1, 0, 1]);
}

#[test]
fn test_locator_errors() {
    let fx = Fixture::new();
    let input = fx.write_input("customers.csv", GENERAL_CSV);
    fx.write_model("legacy.pkl", b"{}");
    let service = ScoringService::new(fx.config(&[("General", "catboost_model.cbm"), ("Legacy", "legacy.pkl")])).unwrap();

    let kind = |model: &str| service.score(&ScoreRequest::new(model, &input)).unwrap_err().kind();
    assert_eq!(kind("Unknown"), "unknown_model");
    assert_eq!(kind("General"), "artifact_not_found");
    assert_eq!(kind("Legacy"), "unsupported_format");
}

#[test]
fn test_unreadable_dataset() {
    let fx = Fixture::new();
    fx.write_model("catboost_model.cbm", &tenure_ensemble().to_bytes());
    let service = ScoringService::new(fx.config(&[("General", "catboost_model.cbm")])).unwrap();

    let missing = Path::new("/nonexistent/input.csv");
    let err = service.score(&ScoreRequest::new("General", missing)).unwrap_err();
    assert_eq!(err.kind(), "dataset_unreadable");
}

#[test]
fn test_uncached_service_reloads() {
    let fx = Fixture::new();
    fx.write_model("catboost_model.cbm", &tenure_ensemble().to_bytes());
    let input = fx.write_input("customers.csv", GENERAL_CSV);
    let mut config = fx.config(&[("General", "catboost_model.cbm")]);
    config.cache_models = false;
    let service = ScoringService::new(config).unwrap();

    service.score(&ScoreRequest::new("General", &input)).unwrap();
    assert!(service.cache().is_none());

    // A replaced artifact is picked up on the next request
    let mut flipped = tenure_ensemble();
    flipped.trees[0].leaf_values = vec![-1.0, 1.0];
    fx.write_model("catboost_model.cbm", &flipped.to_bytes());
    let outcome = service.score(&ScoreRequest::new("General", &input)).unwrap();
    assert_eq!(labels_of(&outcome), vec![0, 1, 0, 1, 0]);
}

#[test]
fn test_concurrent_requests_share_output_dir() {
    let fx = Fixture::new();
    fx.write_model("catboost_model.cbm", &tenure_ensemble().to_bytes());
    let service = ScoringService::new(fx.config(&[("General", "catboost_model.cbm")])).unwrap();

    // Input i holds i + 1 rows, so the surviving table identifies its writer
    let rows: Vec<&str> = GENERAL_CSV.lines().skip(1).collect();
    let inputs: Vec<PathBuf> = (0..rows.len())
        .map(|i| {
            let body = format!("age,income,tenure,notes\n{}\n", rows[..=i].join("\n"));
            fx.write_input(&format!("batch_{i}.csv"), &body)
        })
        .collect();

    std::thread::scope(|scope| {
        for input in &inputs {
            let service = &service;
            let output_dir = fx.output_dir();
            scope.spawn(move || {
                for _ in 0..10 {
                    let outcome = service
                        .score(&ScoreRequest::new("General", input).with_output_dir(&output_dir))
                        .unwrap();
                    assert_eq!(outcome.output.path(), Some(output_dir.join("predicted.csv").as_path()));
                }
            });
        }
    });

    let table = read_result_table(&fx.output_dir().join("predicted.csv")).unwrap();
    let height = table.height();
    assert!((1..=rows.len()).contains(&height));
    assert_eq!(label_column(&table, "Predicted_Target"), vec![1, 0, 1, 0, 1][..height].to_vec());
    assert_eq!(fs::read_dir(fx.output_dir()).unwrap().count(), 1);
}
