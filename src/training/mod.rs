//! Model training module
//!
//! Provides training functionality for the supported classifier families:
//! - Random Forests of Gini trees
//! - L1/L2 regularized logistic regression
//!
//! plus validation metrics, stratified cross-validation and grid search.

mod engine;
mod family;
mod metrics;
mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod linear_models;
pub mod random_forest;

pub use cross_validation::{CVSplit, CrossValidator};
pub use decision_tree::{DecisionTree, TreeNode};
pub use engine::{TrainEngine, TrainingOutcome, TuneLimits, TuningResult};
pub use family::{Hyperparameters, LogisticRegressionParams, ModelFamily, Penalty, RandomForestParams};
pub use linear_models::LogisticRegression;
pub use metrics::{roc_auc, ClassificationMetrics};
pub use models::TrainedModel;
pub use random_forest::RandomForest;
