//! Human-readable pipeline documentation generated from the model spec

use crate::training::{ClassWeight, EstimatorSpec, GridSearchResult, ModelSpec};
use crate::utils::round_to;
use serde::{Deserialize, Serialize};

const FEATURE_DESCRIPTIONS: [(&str, &str); 8] = [
    ("sem1_approval_rate", "Ratio of approved/enrolled units in semester 1"),
    ("sem2_approval_rate", "Ratio of approved/enrolled units in semester 2"),
    ("total_approval_rate", "Overall approval rate across both semesters"),
    ("avg_grade", "Average grade across both semesters"),
    ("grade_improvement", "Difference in grades between semesters"),
    ("total_credited", "Sum of credited units"),
    ("evaluation_efficiency", "Ratio of approved to evaluations"),
    ("financial_stress", "Combined debtor and tuition status indicator"),
];

/// What the documentation generator needs to know about a run
#[derive(Debug, Clone)]
pub struct DocumentationContext<'a> {
    pub spec: &'a ModelSpec,
    /// Estimators fitted on the full training split
    pub fitted: &'a [EstimatorSpec],
    pub search: Option<&'a GridSearchResult>,
    pub feature_engineering: bool,
    pub reference_age: f64,
    pub n_numeric: usize,
    pub n_categorical: usize,
    pub missing_values: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingNotes {
    pub encoding: String,
    pub scaling: String,
    pub missing_values: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNotes {
    pub created_features: Vec<String>,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelNotes {
    #[serde(rename = "type")]
    pub model_type: String,
    pub rationale: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceNotes {
    pub method: String,
    pub rationale: String,
}

/// One row of the cross-validation table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub params: serde_json::Value,
    pub mean_macro_f1: f64,
    pub std_macro_f1: f64,
    pub rank: usize,
}

/// The `pipeline_documentation` block of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDocumentation {
    pub initial_assumptions: Vec<String>,
    pub preprocessing: PreprocessingNotes,
    pub feature_engineering: FeatureNotes,
    pub model: ModelNotes,
    pub hyperparameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_params: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cv_results: Vec<CvSummary>,
    pub imbalance_handling: ImbalanceNotes,
    pub rejected_alternatives: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn class_weight(estimator: &EstimatorSpec) -> ClassWeight {
    match estimator {
        EstimatorSpec::RandomForest(p) => p.class_weight,
        EstimatorSpec::GradientBoosting(p) => p.class_weight,
    }
}

fn estimator_rationale(estimator: &EstimatorSpec) -> &'static str {
    match estimator {
        EstimatorSpec::RandomForest(_) => {
            "RandomForest: Robust to outliers, handles mixed feature types well"
        }
        EstimatorSpec::GradientBoosting(_) => {
            "GradientBoosting: Strong predictive performance on tabular data"
        }
    }
}

impl PipelineDocumentation {
    pub fn generate(ctx: &DocumentationContext<'_>) -> Self {
        Self {
            initial_assumptions: strings(&[
                "Students with poor academic performance in early semesters are more likely to dropout",
                "Financial stress (debtor status, tuition fees) affects retention",
                "Age at enrollment may indicate non-traditional students with different risks",
                "Dataset has class imbalance that needs to be addressed",
            ]),
            preprocessing: Self::preprocessing(ctx),
            feature_engineering: Self::features(ctx),
            model: Self::model(ctx),
            hyperparameters: Self::hyperparameters(ctx),
            best_params: ctx.search.map(|s| s.best_params.clone()),
            cv_results: ctx
                .search
                .map(|s| {
                    s.candidates
                        .iter()
                        .map(|c| CvSummary {
                            params: c.params.clone(),
                            mean_macro_f1: round_to(c.mean_score, 4),
                            std_macro_f1: round_to(c.std_score, 4),
                            rank: c.rank,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            imbalance_handling: Self::imbalance(ctx),
            rejected_alternatives: Self::rejected(ctx.spec),
        }
    }

    fn preprocessing(ctx: &DocumentationContext<'_>) -> PreprocessingNotes {
        let encoding = if ctx.n_categorical == 0 {
            "All features already numeric; Target encoded with LabelEncoder".to_string()
        } else {
            format!(
                "{} categorical columns one-hot encoded (unseen categories ignored); Target encoded with LabelEncoder",
                ctx.n_categorical
            )
        };
        let missing_values = if ctx.missing_values == 0 {
            "No missing values in dataset".to_string()
        } else {
            format!(
                "{} missing values; numeric nulls take the training mean, categorical nulls encode as all-zero indicators",
                ctx.missing_values
            )
        };
        PreprocessingNotes {
            encoding,
            scaling: format!(
                "StandardScaler fitted on the training split, applied to {} numeric features",
                ctx.n_numeric
            ),
            missing_values,
        }
    }

    fn features(ctx: &DocumentationContext<'_>) -> FeatureNotes {
        if !ctx.feature_engineering {
            return FeatureNotes {
                created_features: Vec::new(),
                rationale: "Feature engineering disabled; raw features only".to_string(),
            };
        }
        let mut created: Vec<String> = FEATURE_DESCRIPTIONS
            .iter()
            .map(|(name, desc)| format!("{} - {}", name, desc))
            .collect();
        created.push(format!(
            "age_deviation - Age at enrollment relative to typical age ({})",
            ctx.reference_age
        ));
        FeatureNotes {
            created_features: created,
            rationale: "Academic performance features capture student engagement; financial features capture economic barriers".to_string(),
        }
    }

    fn model(ctx: &DocumentationContext<'_>) -> ModelNotes {
        let mut rationale: Vec<String> = Vec::new();
        for est in ctx.fitted {
            let line = estimator_rationale(est).to_string();
            if !rationale.contains(&line) {
                rationale.push(line);
            }
        }
        match ctx.spec {
            ModelSpec::Single { .. } => {}
            ModelSpec::SoftVoting { .. } => rationale
                .push("Ensemble: Combines model strengths for better generalization".to_string()),
            ModelSpec::GridSearch { grid, cv_folds, .. } => rationale.push(format!(
                "GridSearchCV: {} candidates scored by {}-fold macro F1",
                grid.n_candidates(),
                cv_folds
            )),
        }
        ModelNotes {
            model_type: ctx.spec.describe(),
            rationale,
        }
    }

    fn hyperparameters(ctx: &DocumentationContext<'_>) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        for (i, est) in ctx.fitted.iter().enumerate() {
            let mut key = est.name().to_string();
            if map.contains_key(&key) {
                key = format!("{}_{}", key, i);
            }
            map.insert(key, est.hyperparameters());
        }
        if let ModelSpec::SoftVoting { weights, .. } = ctx.spec {
            let voting = match weights {
                Some(w) => format!("soft (weighted probability averaging, weights {:?})", w),
                None => "soft (probability averaging)".to_string(),
            };
            map.insert("Voting".to_string(), serde_json::Value::String(voting));
        }
        map
    }

    fn imbalance(ctx: &DocumentationContext<'_>) -> ImbalanceNotes {
        let balanced: Vec<&str> = ctx
            .fitted
            .iter()
            .filter(|e| class_weight(e) == ClassWeight::Balanced)
            .map(EstimatorSpec::name)
            .collect();
        if balanced.is_empty() {
            ImbalanceNotes {
                method: "Stratified train/test split only".to_string(),
                rationale: "Class proportions are preserved in both splits; macro F1 is the selection metric".to_string(),
            }
        } else {
            ImbalanceNotes {
                method: format!("class_weight='balanced' in {}", balanced.join(", ")),
                rationale: "Adjusts weights inversely proportional to class frequencies, penalizing misclassification of minority classes more heavily".to_string(),
            }
        }
    }

    fn rejected(spec: &ModelSpec) -> Vec<String> {
        match spec {
            ModelSpec::SoftVoting { .. } => strings(&[
                "Logistic Regression - too simple for complex feature interactions",
                "Single Random Forest - ensemble performs better",
                "SMOTE - synthetic oversampling distorts the minority class distribution",
                "Undersampling - would lose valuable training data",
            ]),
            ModelSpec::GridSearch { .. } => strings(&[
                "Logistic Regression - might be too simple",
                "SVM - scaling sensitive and slower to tune",
            ]),
            ModelSpec::Single { .. } => strings(&[
                "Logistic Regression - too simple for complex feature interactions",
                "Hyperparameter search - defaults kept as a reproducible baseline",
            ]),
        }
    }
}
