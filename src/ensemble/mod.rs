//! Ensemble methods module
//!
//! Soft voting over heterogeneous classifiers.

mod voting;

pub use voting::SoftVotingClassifier;
