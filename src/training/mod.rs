//! Model training module
//!
//! Provides:
//! - Stratified train/test splitting and k-fold cross-validation
//! - CART decision trees (weighted Gini and MSE)
//! - Random forest and multinomial gradient boosting classifiers
//! - Declarative model specs, grid search and the training engine

mod config;
mod engine;
mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod grid_search;
pub mod random_forest;

pub use config::{apply_params, EstimatorSpec, ModelSpec, ParamAxis, ParamGrid, ParamSet, ParamValue};
pub use cross_validation::{allocate_quotas, train_test_split, CVSplit, Split, StratifiedKFold};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{TrainedModel, Trainer};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingParams};
pub use grid_search::{params_to_json, CandidateResult, GridSearch, GridSearchResult};
pub use models::{argmax_rows, class_counts, validate_fit_input, ClassWeight, Classifier};
pub use random_forest::{MaxFeatures, RandomForest, RandomForestParams};
