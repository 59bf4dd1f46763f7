//! Output formatting utilities for markdown and JSON.

use crate::types::{ClusteringReport, Owner, Prediction, TagMask, TaskRecord, TimeseriesPoint};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    #[serde(alias = "md")]
    Markdown,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

/// Render `value` as pretty JSON, or with `markdown` when asked for markdown.
pub fn render<T, F>(value: &T, format: OutputFormat, markdown: F) -> Result<String>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Markdown => Ok(markdown(value)),
    }
}

/// Milliseconds as `1h 2m 3.4s`.
pub fn format_duration_ms(ms: f64) -> String {
    if !ms.is_finite() {
        return ms.to_string();
    }
    let sign = if ms < 0.0 { "-" } else { "" };
    let total_secs = ms.abs() / 1000.0;
    let hours = (total_secs / 3600.0).floor();
    let minutes = ((total_secs - hours * 3600.0) / 60.0).floor();
    let seconds = total_secs - hours * 3600.0 - minutes * 60.0;

    if hours > 0.0 {
        format!("{}{}h {}m {:.1}s", sign, hours, minutes, seconds)
    } else if minutes > 0.0 {
        format!("{}{}m {:.1}s", sign, minutes, seconds)
    } else {
        format!("{}{:.1}s", sign, seconds)
    }
}

/// Format a single owner as markdown.
pub fn format_owner_markdown(owner: &Owner) -> String {
    let mut md = String::new();
    let stats = &owner.stats;

    md.push_str(&format!("## {}: {}\n", capitalize(owner.kind.as_str()), owner.name));
    md.push_str(&format!("- **id**: `{}`\n", owner.id));
    md.push_str(&format!(
        "- **tasks**: {} ({} under, {} over)\n",
        stats.total_tasks_completed, stats.total_under_tasks, stats.total_over_tasks
    ));
    md.push_str(&format!(
        "- **avg task time**: {}\n",
        format_duration_ms(stats.avg_task_time)
    ));
    md.push_str(&format!("- **estimation factor**: {:.3}\n", stats.task_est_factor));

    md
}

/// Format a list of owners as markdown.
pub fn format_owners_markdown(owners: &[Owner]) -> String {
    let mut md = format!("# Owners ({})\n\n", owners.len());
    for owner in owners {
        md.push_str(&format_owner_markdown(owner));
        md.push('\n');
    }
    md
}

/// Format tasks as a markdown table.
pub fn format_tasks_markdown(tasks: &[TaskRecord]) -> String {
    let mut md = format!("# Tasks ({})\n\n", tasks.len());
    if tasks.is_empty() {
        return md;
    }

    md.push_str("| id | expected | actual | ratio | tags |\n");
    md.push_str("|---|---|---|---|---|\n");
    for task in tasks {
        let ratio = if task.expected_duration > 0.0 {
            format!("{:.2}", task.actual_duration / task.expected_duration)
        } else {
            "-".to_string()
        };
        let tags: Vec<&str> = task.tags.iter().map(String::as_str).collect();
        md.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            short_id(&task.id),
            format_duration_ms(task.expected_duration),
            format_duration_ms(task.actual_duration),
            ratio,
            tags.join(", "),
        ));
    }
    md
}

/// Format a prediction with its per-cluster breakdown.
pub fn format_prediction_markdown(prediction: &Prediction) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "## Estimate: {}\n",
        format_duration_ms(prediction.estimate)
    ));
    md.push_str(&format!("- **ms**: {:.1}\n", prediction.estimate));
    md.push_str(&format!("- **source**: {}\n", prediction.source.as_str()));
    md.push_str(&format!("- **clusters**: {}\n", prediction.cluster_count));

    if !prediction.contributions.is_empty() {
        md.push_str("\n| cluster | size | distance | prediction | weight |\n");
        md.push_str("|---|---|---|---|---|\n");
        for c in &prediction.contributions {
            let distance = c
                .centroid_distance
                .map(|d| format!("{:.1}", d))
                .unwrap_or_else(|| "-".to_string());
            let predicted = match (&c.prediction, &c.skipped) {
                (Some(p), _) => format_duration_ms(*p),
                (None, Some(reason)) => format!("skipped: {}", reason),
                (None, None) => "-".to_string(),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {:.3} |\n",
                c.index, c.size, distance, predicted, c.weight
            ));
        }
    }

    md
}

/// Format a clustering report.
pub fn format_clusters_markdown(report: &ClusteringReport) -> String {
    let mut md = format!("# Clusters ({})\n\n", report.k);
    if report.fallback {
        md.push_str("_k-means failed; all tasks grouped together_\n\n");
    }
    if !report.vocabulary.is_empty() {
        md.push_str(&format!("- **tags**: {}\n\n", report.vocabulary.join(", ")));
    }

    for (i, cluster) in report.clusters.iter().enumerate() {
        md.push_str(&format!("## Cluster {} ({} tasks)\n", i, cluster.task_ids.len()));
        if cluster.centroid.len() >= 2 {
            md.push_str(&format!(
                "- **mean expected**: {}\n- **mean actual**: {}\n",
                format_duration_ms(cluster.centroid[0]),
                format_duration_ms(cluster.centroid[1])
            ));
        }
        let ids: Vec<String> = cluster
            .task_ids
            .iter()
            .map(|id| format!("`{}`", short_id(id)))
            .collect();
        md.push_str(&format!("- **tasks**: {}\n\n", ids.join(", ")));
    }
    md
}

/// Format an estimation-factor time series.
pub fn format_timeseries_markdown(points: &[TimeseriesPoint]) -> String {
    let mut md = format!("# Estimation factor ({} points)\n\n", points.len());
    for point in points {
        md.push_str(&format!("- {}: {:.3}\n", point.name, point.value));
    }
    md
}

/// Format a tag mask as a two-column table.
pub fn format_mask_markdown(mask: &TagMask) -> String {
    let mut md = format!("# Tag mask ({} tags)\n\n", mask.vocabulary.len());
    if mask.vocabulary.is_empty() {
        return md;
    }

    md.push_str("| tag | set |\n");
    md.push_str("|---|---|\n");
    for (tag, bit) in mask.vocabulary.iter().zip(&mask.mask) {
        md.push_str(&format!("| {} | {} |\n", tag, if *bit > 0.0 { "x" } else { "" }));
    }
    md
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

fn short_id(id: &str) -> &str {
    id.get(id.len().saturating_sub(8)..).unwrap_or(id)
}
