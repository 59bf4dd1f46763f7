//! Owner subcommands.

use super::KindArg;
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct OwnerArgs {
    #[command(subcommand)]
    pub command: OwnerCommand,
}

#[derive(Subcommand, Debug)]
pub enum OwnerCommand {
    /// Create a user or team
    Create {
        name: String,

        #[arg(short, long, value_enum, default_value_t = KindArg::User)]
        kind: KindArg,
    },

    /// List owners
    List {
        /// Only owners of this kind
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Show an owner and its statistics
    Show {
        /// Owner id or name
        owner: String,

        /// Statistics over the tasks with this tag only
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Delete an owner and all its tasks
    Delete {
        /// Owner id or name
        owner: String,
    },
}
