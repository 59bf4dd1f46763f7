//! task-estimator
//!
//! Records completed tasks per user or team and predicts how long the next
//! one will take from the owner's history.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use task_estimator::cli::owner::OwnerCommand;
use task_estimator::cli::predict::{ClusterArgs, MaskArgs, PredictArgs, TimeseriesArgs};
use task_estimator::cli::task::TaskCommand;
use task_estimator::cli::{Cli, Command};
use task_estimator::config::Config;
use task_estimator::db::Database;
use task_estimator::db::tasks::TaskUpdate;
use task_estimator::error::CliError;
use task_estimator::estimate::{DurationEstimator, TagVocabulary, estimation_timeseries};
use task_estimator::format::{self, OutputFormat, render};
use task_estimator::logging::{self, LogTarget};
use task_estimator::types::{TagMask, TargetTask};
use tracing::{debug, info};

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => println!("{}", output),
        Err(err) => {
            let cli_err = CliError::from(err);
            match serde_json::to_string(&cli_err) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", cli_err),
            }
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = Config::resolve(cli.config.as_deref().map(Path::new))?;
    if let Some(db_path) = &cli.database {
        config.store.db_path = db_path.into();
    }
    if let Some(format) = cli.format {
        config.output.format = format.into();
    }
    config.validate()?;
    config.ensure_db_dir()?;

    debug!(db = %config.store.db_path.display(), "opening store");
    let db = Database::open(&config.store.db_path)?;
    let out = config.output.format;

    match cli.command {
        Command::Owner(args) => run_owner(&db, args.command, out),
        Command::Task(args) => run_task(&db, args.command, out),
        Command::Predict(args) => run_predict(&db, &config, args, out),
        Command::Cluster(args) => run_cluster(&db, &config, args, out),
        Command::Timeseries(args) => run_timeseries(&db, args, out),
        Command::Mask(args) => run_mask(&db, args, out),
    }
}

fn run_owner(db: &Database, command: OwnerCommand, out: OutputFormat) -> Result<String> {
    match command {
        OwnerCommand::Create { name, kind } => {
            let owner = db.create_owner(&name, kind.into())?;
            info!(id = %owner.id, name = %owner.name, kind = owner.kind.as_str(), "owner created");
            render(&owner, out, format::format_owner_markdown)
        }
        OwnerCommand::List { kind } => {
            let owners = db.list_owners(kind.map(Into::into))?;
            render(&owners[..], out, format::format_owners_markdown)
        }
        OwnerCommand::Show { owner, tag } => {
            let mut owner = db.resolve_owner(&owner)?;
            if let Some(tag) = tag.as_deref() {
                owner.stats = db.owner_stats(&owner.id, Some(tag))?;
            }
            render(&owner, out, format::format_owner_markdown)
        }
        OwnerCommand::Delete { owner } => {
            let owner = db.resolve_owner(&owner)?;
            db.delete_owner(&owner.id)?;
            info!(id = %owner.id, "owner deleted");
            render(&owner, out, format::format_owner_markdown)
        }
    }
}

fn run_task(db: &Database, command: TaskCommand, out: OutputFormat) -> Result<String> {
    match command {
        TaskCommand::Add {
            owner,
            expected,
            actual,
            tags,
            created_at,
        } => {
            let owner = db.resolve_owner(&owner)?;
            let task = db.add_task(&owner.id, expected, actual, tags, created_at)?;
            info!(id = %task.id, owner = %owner.name, "task recorded");
            render(std::slice::from_ref(&task), out, format::format_tasks_markdown)
        }
        TaskCommand::Edit {
            id,
            expected,
            actual,
            tags,
            clear_tags,
        } => {
            let update = TaskUpdate {
                expected_duration: expected,
                actual_duration: actual,
                tags: if clear_tags { Some(Vec::new()) } else { tags },
            };
            let task = db.update_task(&id, update)?;
            info!(id = %task.id, "task updated");
            render(std::slice::from_ref(&task), out, format::format_tasks_markdown)
        }
        TaskCommand::Delete { id } => {
            let task = db.delete_task(&id)?;
            info!(id = %task.id, "task deleted");
            render(std::slice::from_ref(&task), out, format::format_tasks_markdown)
        }
        TaskCommand::List { owner, tag } => {
            let owner = db.resolve_owner(&owner)?;
            let tasks = db.list_tasks(&owner.id, tag.as_deref())?;
            render(&tasks[..], out, format::format_tasks_markdown)
        }
    }
}

fn run_predict(db: &Database, config: &Config, args: PredictArgs, out: OutputFormat) -> Result<String> {
    let owner = db.resolve_owner(&args.owner)?;

    let mut estimator_config = config.estimator;
    if let Some(mode) = args.mode {
        estimator_config.mode = mode.into();
    }
    if let Some(regression) = args.regression {
        estimator_config.regression = regression.into();
    }
    if args.divide_by_cluster_count {
        estimator_config.divide_by_cluster_count = true;
    }

    let history = db.list_tasks(&owner.id, args.history_tag.as_deref())?;
    let stats = db.owner_stats(&owner.id, args.history_tag.as_deref())?;

    let mut target = TargetTask::new(args.expected, args.tags);
    if let Some(created_at) = args.created_at {
        target = target.with_created_at(created_at);
    }

    let prediction = DurationEstimator::new(estimator_config).predict(&target, &history, &stats)?;
    render(&prediction, out, format::format_prediction_markdown)
}

fn run_cluster(db: &Database, config: &Config, args: ClusterArgs, out: OutputFormat) -> Result<String> {
    let owner = db.resolve_owner(&args.owner)?;
    let history = db.list_tasks(&owner.id, args.history_tag.as_deref())?;
    let report = DurationEstimator::new(config.estimator).cluster_tasks(&history)?;
    render(&report, out, format::format_clusters_markdown)
}

fn run_timeseries(db: &Database, args: TimeseriesArgs, out: OutputFormat) -> Result<String> {
    let owner = db.resolve_owner(&args.owner)?;
    let tasks = db.list_tasks(&owner.id, args.tag.as_deref())?;
    let series = estimation_timeseries(&tasks)?;
    render(&series[..], out, format::format_timeseries_markdown)
}

fn run_mask(db: &Database, args: MaskArgs, out: OutputFormat) -> Result<String> {
    let owner = db.resolve_owner(&args.owner)?;
    let tasks = db.list_tasks(&owner.id, None)?;
    let vocabulary = TagVocabulary::from_tasks(&tasks);
    let tags = args.tags.into_iter().collect();
    let mask = TagMask {
        mask: vocabulary.mask(&tags),
        vocabulary: vocabulary.tags().to_vec(),
    };
    render(&mask, out, format::format_mask_markdown)
}
