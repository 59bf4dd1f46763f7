//! Task Estimator Library
//!
//! Per-owner task duration prediction: feature vectors over an owner's tag
//! vocabulary, k-means clustering, per-cluster regression and a
//! distance-weighted ensemble, plus the SQLite store that keeps each
//! owner's running statistics.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod estimate;
pub mod format;
pub mod logging;
pub mod types;
