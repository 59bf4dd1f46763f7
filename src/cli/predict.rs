//! Estimation and inspection subcommands.

use super::{ModeArg, RegressionArg};
use clap::Args;

/// Arguments for the predict subcommand
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Owner id or name
    pub owner: String,

    /// Planned duration in milliseconds
    #[arg(short, long, value_name = "MS")]
    pub expected: f64,

    /// Tags of the new task (comma-separated or repeated)
    #[arg(short, long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Creation time in epoch milliseconds (default: now)
    #[arg(long, value_name = "EPOCH_MS")]
    pub created_at: Option<i64>,

    /// Use only history tasks carrying this tag
    #[arg(long, value_name = "TAG")]
    pub history_tag: Option<String>,

    /// Estimation mode (overrides config)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Regression strategy (overrides config)
    #[arg(short, long, value_enum)]
    pub regression: Option<RegressionArg>,

    /// Divide the blended estimate by the number of clusters
    #[arg(long)]
    pub divide_by_cluster_count: bool,
}

/// Arguments for the cluster subcommand
#[derive(Args, Debug)]
pub struct ClusterArgs {
    /// Owner id or name
    pub owner: String,

    /// Use only history tasks carrying this tag
    #[arg(long, value_name = "TAG")]
    pub history_tag: Option<String>,
}

/// Arguments for the timeseries subcommand
#[derive(Args, Debug)]
pub struct TimeseriesArgs {
    /// Owner id or name
    pub owner: String,

    /// Only tasks carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

/// Arguments for the mask subcommand
#[derive(Args, Debug)]
pub struct MaskArgs {
    /// Owner id or name
    pub owner: String,

    /// Tags to encode (comma-separated or repeated)
    #[arg(short, long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,
}
