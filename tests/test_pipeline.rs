//! Integration test: full pipeline from CSV to JSON report

use student_outcome::error::PipelineError;
use student_outcome::pipeline::{Pipeline, PipelineConfig};
use student_outcome::report::PipelineReport;
use student_outcome::training::{
    ClassWeight, EstimatorSpec, GradientBoostingParams, ModelSpec, ParamGrid, ParamValue,
    RandomForestParams,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HEADER: [&str; 16] = [
    "Course",
    "Debtor",
    "Tuition fees up to date",
    "Age at enrollment",
    "Curricular units 1st sem (credited)",
    "Curricular units 1st sem (enrolled)",
    "Curricular units 1st sem (evaluations)",
    "Curricular units 1st sem (approved)",
    "Curricular units 1st sem (grade)",
    "Curricular units 2nd sem (credited)",
    "Curricular units 2nd sem (enrolled)",
    "Curricular units 2nd sem (evaluations)",
    "Curricular units 2nd sem (approved)",
    "Curricular units 2nd sem (grade)",
    "Scholarship holder",
    "Target",
];

/// One semicolon-separated row whose values lean towards `target`
fn student_row(i: usize, target: &str) -> String {
    let jitter = (i * 7 % 5) as f64 * 0.2;
    let (approved, grade, debtor, tuition) = match target {
        "Dropout" => (i % 3, 6.0 + jitter, 1, 0),
        "Enrolled" => (3 + i % 2, 11.0 + jitter, i % 2, 1),
        _ => (6, 14.0 + jitter, 0, 1),
    };
    let course = if i % 2 == 0 { "Nursing" } else { "Management" };
    // The second semester has no enrolled units every fifth row
    let enrolled2 = if i % 5 == 0 { 0 } else { 6 };
    let approved2 = if enrolled2 == 0 { 0 } else { approved };
    let fields = [
        course.to_string(),
        debtor.to_string(),
        tuition.to_string(),
        (18 + i % 9).to_string(),
        (i % 2).to_string(),
        "6".to_string(),
        "8".to_string(),
        approved.to_string(),
        format!("{:.2}", grade),
        "0".to_string(),
        enrolled2.to_string(),
        "7".to_string(),
        approved2.to_string(),
        format!("{:.2}", grade + 0.5),
        (if i % 3 == 0 { "1" } else { "0" }).to_string(),
        target.to_string(),
    ];
    fields.join(";")
}

fn write_csv(dir: &Path, targets: &[&str]) -> PathBuf {
    let mut lines = vec![HEADER.join(";")];
    lines.extend(targets.iter().enumerate().map(|(i, t)| student_row(i, t)));
    let path = dir.join("data.csv");
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

fn balanced_targets(n: usize) -> Vec<&'static str> {
    // 50% Graduate, 30% Dropout, 20% Enrolled
    (0..n)
        .map(|i| match i % 10 {
            0..=4 => "Graduate",
            5..=7 => "Dropout",
            _ => "Enrolled",
        })
        .collect()
}

fn small_forest() -> ModelSpec {
    ModelSpec::Single {
        estimator: EstimatorSpec::RandomForest(RandomForestParams {
            n_estimators: 20,
            class_weight: ClassWeight::Balanced,
            ..Default::default()
        }),
    }
}

fn config(dir: &TempDir, data: PathBuf) -> PipelineConfig {
    PipelineConfig::new()
        .with_data_path(data)
        .with_output_path(dir.path().join("result.json"))
        .with_model(small_forest())
}

#[test]
fn test_end_to_end_report() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(dir.path(), &balanced_targets(100));
    let cfg = config(&dir, data);

    let outcome = Pipeline::new(cfg.clone()).unwrap().run().unwrap();
    let report = PipelineReport::from_json_file(&cfg.output_path).unwrap();

    assert_eq!(report, outcome.report);
    assert_eq!(report.confusion_matrix.labels, vec!["Dropout", "Enrolled", "Graduate"]);
    assert_eq!(outcome.split.test.len(), 20);
    assert_eq!(outcome.split.train.len(), 80);

    let total: usize = report.confusion_matrix.matrix.iter().flatten().sum();
    assert_eq!(total, 20);
    for (label, row) in report.confusion_matrix.labels.iter().zip(&report.confusion_matrix.matrix) {
        assert_eq!(row.iter().sum::<usize>(), report.per_class_metrics[label].support);
    }
    assert_eq!(report.per_class_metrics["Graduate"].support, 10);
    assert_eq!(report.per_class_metrics["Dropout"].support, 6);
    assert_eq!(report.per_class_metrics["Enrolled"].support, 4);

    let m = &report.evaluation_metrics;
    for v in [m.macro_f1_score, m.weighted_f1_score, m.balanced_accuracy, m.accuracy] {
        assert!((0.0..=1.0).contains(&v));
    }
    assert!(m.accuracy > 0.8, "accuracy {}", m.accuracy);

    // 14 raw numeric + 9 derived, then Course indicators
    assert_eq!(outcome.feature_names.len(), 14 + 9 + 2);
    assert!(outcome.feature_names.contains(&"total_approval_rate".to_string()));
    assert_eq!(report.pipeline_documentation.feature_engineering.created_features.len(), 9);
}

#[test]
fn test_same_seed_same_result() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(dir.path(), &balanced_targets(60));
    let cfg = config(&dir, data);

    let a = Pipeline::new(cfg.clone()).unwrap().run().unwrap();
    let b = Pipeline::new(cfg).unwrap().run().unwrap();

    assert_eq!(a.split, b.split);
    assert_eq!(a.evaluation, b.evaluation);
    assert_eq!(a.feature_importances, b.feature_importances);
}

#[test]
fn test_ten_row_scenario() {
    let dir = TempDir::new().unwrap();
    let targets = [
        "Dropout", "Graduate", "Dropout", "Enrolled", "Dropout", "Graduate", "Dropout", "Enrolled",
        "Dropout", "Enrolled",
    ];
    let data = write_csv(dir.path(), &targets);
    let cfg = config(&dir, data);

    let first = Pipeline::new(cfg.clone()).unwrap().run().unwrap();
    let second = Pipeline::new(cfg).unwrap().run().unwrap();

    // 5 Dropout / 3 Enrolled / 2 Graduate: ceil(0.2 * 10) = 2 held out,
    // one Dropout and one Enrolled by largest remainder
    assert_eq!(first.split.test.len(), 2);
    let supports: Vec<usize> = first.evaluation.per_class.iter().map(|m| m.support).collect();
    assert_eq!(supports, vec![1, 1, 0]);
    assert_eq!(first.split, second.split);
    assert_eq!(first.evaluation.confusion_matrix, second.evaluation.confusion_matrix);
}

#[test]
fn test_missing_target_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(dir.path(), &balanced_targets(30));
    let cfg = config(&dir, data).with_target_column("Outcome");

    let result = Pipeline::new(cfg.clone()).unwrap().run();
    assert!(matches!(result, Err(PipelineError::DataError(_))));
    assert!(!cfg.output_path.exists());
}

#[test]
fn test_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir, dir.path().join("absent.csv"));
    assert!(Pipeline::new(cfg).unwrap().run().is_err());
}

#[test]
fn test_unwritable_output() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(dir.path(), &balanced_targets(30));
    let cfg = config(&dir, data).with_output_path(dir.path().join("missing").join("result.json"));

    let result = Pipeline::new(cfg).unwrap().run();
    assert!(matches!(result, Err(PipelineError::IoError(_))));
}

#[test]
fn test_missing_source_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::write(&path, "Age at enrollment;Target\n19;Graduate\n20;Dropout\n21;Graduate\n22;Dropout\n").unwrap();

    let result = Pipeline::new(config(&dir, path)).unwrap().run();
    assert!(matches!(result, Err(PipelineError::FeatureNotFound(_))));

    let dir2 = TempDir::new().unwrap();
    let path2 = dir2.path().join("data.csv");
    std::fs::write(
        &path2,
        "Age at enrollment;Target\n19;Graduate\n20;Dropout\n21;Graduate\n22;Dropout\n23;Graduate\n24;Dropout\n",
    )
    .unwrap();
    let cfg = config(&dir2, path2).with_feature_engineering(false);
    assert!(Pipeline::new(cfg).unwrap().run().is_ok());
}

#[test]
fn test_grid_search_report() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(dir.path(), &balanced_targets(60));
    let cfg = config(&dir, data).with_model(ModelSpec::GridSearch {
        estimator: EstimatorSpec::RandomForest(RandomForestParams {
            n_estimators: 10,
            ..Default::default()
        }),
        grid: ParamGrid::new()
            .add("max_depth", vec![ParamValue::Int(2), ParamValue::None])
            .add("min_samples_split", vec![ParamValue::Int(2), ParamValue::Int(5)]),
        cv_folds: 3,
    });

    let outcome = Pipeline::new(cfg).unwrap().run().unwrap();
    let doc = &outcome.report.pipeline_documentation;

    let best = doc.best_params.as_ref().unwrap();
    assert!(best.get("max_depth").is_some());
    assert_eq!(doc.cv_results.len(), 4);
    assert!(doc.cv_results.iter().any(|r| r.rank == 1));
    assert_eq!(doc.model.model_type, "RandomForest (GridSearchCV tuned)");
}

#[test]
fn test_soft_voting_report() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(dir.path(), &balanced_targets(60));
    let cfg = config(&dir, data).with_model(ModelSpec::SoftVoting {
        estimators: vec![
            EstimatorSpec::RandomForest(RandomForestParams {
                n_estimators: 10,
                class_weight: ClassWeight::Balanced,
                ..Default::default()
            }),
            EstimatorSpec::GradientBoosting(GradientBoostingParams {
                n_estimators: 10,
                ..Default::default()
            }),
        ],
        weights: None,
    });

    let outcome = Pipeline::new(cfg.clone()).unwrap().run().unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&cfg.output_path).unwrap()).unwrap();

    assert_eq!(
        json["pipeline_documentation"]["model"]["type"],
        "Voting Ensemble (RandomForest + GradientBoosting)"
    );
    assert_eq!(
        json["pipeline_documentation"]["hyperparameters"]["Voting"],
        "soft (probability averaging)"
    );
    assert!(outcome.report.training_time_seconds >= 0.0);
}

#[test]
fn test_rerun_overwrites_report() {
    let dir = TempDir::new().unwrap();
    let data = write_csv(dir.path(), &balanced_targets(40));
    let cfg = config(&dir, data);
    std::fs::write(&cfg.output_path, "{}").unwrap();

    Pipeline::new(cfg.clone()).unwrap().run().unwrap();
    assert!(PipelineReport::from_json_file(&cfg.output_path).is_ok());
}
