//! CLI command definitions for task-estimator
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod owner;
pub mod predict;
pub mod task;

use crate::estimate::{EstimationMode, RegressionStrategy};
use crate::format::OutputFormat;
use crate::types::OwnerKind;
use clap::{Parser, Subcommand, ValueEnum};
use owner::OwnerArgs;
use predict::{ClusterArgs, MaskArgs, PredictArgs, TimeseriesArgs};
use task::TaskArgs;

/// Output format flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Json,
    #[value(alias = "md")]
    Markdown,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

/// Owner kind flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KindArg {
    #[default]
    User,
    Team,
}

impl From<KindArg> for OwnerKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::User => OwnerKind::User,
            KindArg::Team => OwnerKind::Team,
        }
    }
}

/// Estimation mode flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Ensemble,
    NearestCentroid,
    Naive,
}

impl From<ModeArg> for EstimationMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Ensemble => EstimationMode::Ensemble,
            ModeArg::NearestCentroid => EstimationMode::NearestCentroid,
            ModeArg::Naive => EstimationMode::Naive,
        }
    }
}

/// Regression strategy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegressionArg {
    Simple,
    Multiple,
}

impl From<RegressionArg> for RegressionStrategy {
    fn from(arg: RegressionArg) -> Self {
        match arg {
            RegressionArg::Simple => RegressionStrategy::Simple,
            RegressionArg::Multiple => RegressionStrategy::Multiple,
        }
    }
}

/// Per-owner task duration estimation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format (overrides config)
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<FormatArg>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage users and teams
    Owner(OwnerArgs),

    /// Record, edit and list completed tasks
    Task(TaskArgs),

    /// Estimate the duration of a new task
    Predict(PredictArgs),

    /// Show how an owner's history is clustered
    Cluster(ClusterArgs),

    /// Running estimation factor over an owner's history
    Timeseries(TimeseriesArgs),

    /// Tag indicator vector over an owner's vocabulary
    Mask(MaskArgs),
}
