//! End-to-end run: load, engineer, split, preprocess, train, evaluate, report

use super::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::evaluation::EvaluationReport;
use crate::feature_engineering::FeatureEngineer;
use crate::preprocessing::{LabelEncoder, Preprocessor};
use crate::report::{write_report, DocumentationContext, PipelineDocumentation, PipelineReport};
use crate::training::{train_test_split, Split, Trainer};
use crate::utils::{string_column, take_rows, DataLoader, DatasetSummary};
use ndarray::Axis;
use polars::prelude::*;
use tracing::{debug, info};

const TOP_IMPORTANCES: usize = 10;

/// Everything a run produced, besides the written report file
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: PipelineReport,
    pub evaluation: EvaluationReport,
    pub summary: DatasetSummary,
    pub split: Split,
    /// Feature matrix columns, in order
    pub feature_names: Vec<String>,
    /// Importance per feature, highest first, when the model exposes them
    pub feature_importances: Vec<(String, f64)>,
}

/// Student outcome classification pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline; the configuration is validated up front
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read the configured table
    pub fn load(&self) -> Result<DataFrame> {
        DataLoader::new(self.config.separator_byte()?).load_csv(&self.config.data_path)
    }

    /// Run on the configured input and write the report.
    ///
    /// Nothing is written when any stage fails.
    pub fn run(&self) -> Result<RunOutcome> {
        let df = self.load()?;
        let outcome = self.evaluate_frame(&df)?;
        write_report(&self.config.output_path, &outcome.report)?;
        Ok(outcome)
    }

    /// Every stage except reading and writing files
    pub fn evaluate_frame(&self, df: &DataFrame) -> Result<RunOutcome> {
        let cfg = &self.config;
        let target = cfg.target_column.as_str();

        if df.column(target).is_err() {
            return Err(PipelineError::DataError(format!(
                "target column '{}' not found",
                target
            )));
        }

        let summary = DatasetSummary::from_frame(df, target)?;
        info!(
            rows = summary.n_rows,
            features = summary.n_features,
            missing = summary.missing_values,
            classes = ?summary.class_counts,
            "dataset loaded"
        );

        // Target
        let mut encoder = LabelEncoder::new();
        let y = encoder.fit_transform(&string_column(df, target)?)?;
        let n_classes = encoder.n_classes();
        if n_classes < 2 {
            return Err(PipelineError::DataError(format!(
                "target column '{}' has {} distinct value(s), need at least 2",
                target, n_classes
            )));
        }
        info!(classes = ?encoder.classes(), "target encoded");

        // Features
        let mut features = df.drop(target)?;
        if cfg.feature_engineering {
            let width = features.width();
            features = FeatureEngineer::new(cfg.source_columns.clone())
                .with_reference_age(cfg.reference_age)
                .transform(&features)?;
            debug!(added = features.width() - width, "derived features appended");
        }

        // Split
        let labels = y.to_vec();
        let split = train_test_split(&labels, cfg.test_fraction, cfg.random_state)?;
        info!(
            train = split.train.len(),
            test = split.test.len(),
            seed = cfg.random_state,
            "stratified split"
        );
        let train_df = take_rows(&features, &split.train)?;
        let test_df = take_rows(&features, &split.test)?;
        let y_train = y.select(Axis(0), &split.train);
        let y_test = y.select(Axis(0), &split.test);

        // Preprocess, fitted on train rows only
        let transform = Preprocessor::new()
            .with_excluded_columns(cfg.excluded_columns.clone())
            .fit(&train_df)?;
        let x_train = transform.apply(&train_df)?;
        let x_test = transform.apply(&test_df)?;

        // Train
        let trained = Trainer::new(cfg.random_state).fit(&cfg.model, &x_train, &y_train, n_classes)?;

        let mut feature_importances: Vec<(String, f64)> = trained
            .feature_importances()
            .map(|imp| {
                transform
                    .feature_names()
                    .iter()
                    .cloned()
                    .zip(imp.iter().copied())
                    .collect()
            })
            .unwrap_or_default();
        feature_importances.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (rank, (name, importance)) in feature_importances.iter().take(TOP_IMPORTANCES).enumerate() {
            info!(rank = rank + 1, feature = %name, importance, "feature importance");
        }

        // Evaluate
        let y_pred = trained.predict(&x_test)?;
        let evaluation = EvaluationReport::from_predictions(&y_test, &y_pred, encoder.classes())?;
        info!(
            macro_f1 = evaluation.macro_f1,
            weighted_f1 = evaluation.weighted_f1,
            balanced_accuracy = evaluation.balanced_accuracy,
            accuracy = evaluation.accuracy,
            "evaluation finished"
        );

        let documentation = PipelineDocumentation::generate(&DocumentationContext {
            spec: &cfg.model,
            fitted: trained.estimators(),
            search: trained.search(),
            feature_engineering: cfg.feature_engineering,
            reference_age: cfg.reference_age,
            n_numeric: transform.numeric_columns().len(),
            n_categorical: transform.categorical_columns().len(),
            missing_values: summary.missing_values,
        });
        let report = PipelineReport::new(&evaluation, trained.training_time_secs(), documentation);

        Ok(RunOutcome {
            report,
            evaluation,
            summary,
            split,
            feature_names: transform.feature_names().to_vec(),
            feature_importances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{EstimatorSpec, MaxFeatures, ModelSpec, RandomForestParams};

    fn frame() -> DataFrame {
        let n = 30;
        let target: Vec<&str> = (0..n)
            .map(|i| match i % 3 {
                0 => "Dropout",
                1 => "Enrolled",
                _ => "Graduate",
            })
            .collect();
        let score: Vec<f64> = (0..n).map(|i| (i % 3) as f64 * 5.0 + (i as f64) * 0.01).collect();
        let course: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "a" } else { "b" }).collect();
        df!(
            "score" => score,
            "course" => course,
            "Target" => target,
        )
        .unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig::new()
            .with_feature_engineering(false)
            .with_model(ModelSpec::Single {
                estimator: EstimatorSpec::RandomForest(RandomForestParams {
                    n_estimators: 10,
                    max_features: MaxFeatures::All,
                    ..Default::default()
                }),
            })
    }

    #[test]
    fn test_evaluate_frame() {
        let pipeline = Pipeline::new(config()).unwrap();
        let outcome = pipeline.evaluate_frame(&frame()).unwrap();

        assert_eq!(outcome.split.test.len(), 6);
        assert_eq!(outcome.feature_names, vec!["score", "course_a", "course_b"]);
        assert_eq!(outcome.evaluation.labels, vec!["Dropout", "Enrolled", "Graduate"]);
        assert_eq!(outcome.evaluation.accuracy, 1.0);
        assert_eq!(outcome.feature_importances[0].0, "score");
    }

    #[test]
    fn test_missing_target() {
        let pipeline = Pipeline::new(config().with_target_column("Outcome")).unwrap();
        let result = pipeline.evaluate_frame(&frame());
        assert!(matches!(result, Err(PipelineError::DataError(_))));
    }

    #[test]
    fn test_single_class_rejected() {
        let df = df!("x" => [1.0, 2.0, 3.0], "Target" => ["a", "a", "a"]).unwrap();
        let pipeline = Pipeline::new(config()).unwrap();
        assert!(pipeline.evaluate_frame(&df).is_err());
    }

    #[test]
    fn test_excluded_columns() {
        let pipeline =
            Pipeline::new(config().with_excluded_columns(vec!["course".to_string()])).unwrap();
        let outcome = pipeline.evaluate_frame(&frame()).unwrap();
        assert_eq!(outcome.feature_names, vec!["score"]);
    }
}
