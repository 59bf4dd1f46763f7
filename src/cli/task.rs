//! Task subcommands. Durations are milliseconds.

use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Record a completed task
    Add {
        /// Owner id or name
        owner: String,

        #[arg(short, long, value_name = "MS")]
        expected: f64,

        #[arg(short, long, value_name = "MS")]
        actual: f64,

        /// Comma-separated or repeated
        #[arg(short, long = "tag", value_delimiter = ',')]
        tags: Vec<String>,

        /// Creation time in epoch milliseconds (default: now)
        #[arg(long, value_name = "EPOCH_MS")]
        created_at: Option<i64>,
    },

    /// Change a task's durations or tags
    Edit {
        id: String,

        #[arg(short, long, value_name = "MS")]
        expected: Option<f64>,

        #[arg(short, long, value_name = "MS")]
        actual: Option<f64>,

        /// Replacement tag list (comma-separated or repeated)
        #[arg(short, long = "tag", value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Remove all tags
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },

    /// Delete a task
    Delete { id: String },

    /// List an owner's tasks in creation order
    List {
        /// Owner id or name
        owner: String,

        #[arg(short, long)]
        tag: Option<String>,
    },
}
