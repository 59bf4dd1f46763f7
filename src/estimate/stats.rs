//! Incremental aggregate statistics for an owner's tasks.
//!
//! The running means are updated in place, so each task lifecycle event must
//! be applied exactly once: add on create, remove on delete, and
//! [`AggregateStats::replace_task`] (remove old, add new) on edit. Callers
//! that share one owner between threads must serialize these updates.

use crate::error::{EstimateError, EstimateResult};
use crate::types::{AggregateStats, TaskRecord, TimeseriesPoint};
use chrono::{DateTime, SecondsFormat};

/// actual/expected for one task.
pub fn duration_ratio(task: &TaskRecord) -> EstimateResult<f64> {
    if task.expected_duration == 0.0 {
        return Err(EstimateError::zero_expected_duration());
    }
    if !task.expected_duration.is_finite()
        || task.expected_duration < 0.0
        || !task.actual_duration.is_finite()
        || task.actual_duration < 0.0
    {
        return Err(EstimateError::invalid_input(format!(
            "task {} has invalid durations (expected {}, actual {})",
            task.id, task.expected_duration, task.actual_duration
        )));
    }
    Ok(task.actual_duration / task.expected_duration)
}

impl AggregateStats {
    /// Fold a task into the running statistics.
    pub fn add_task(&mut self, task: &TaskRecord) -> EstimateResult<()> {
        let ratio = duration_ratio(task)?;
        let n = f64::from(self.total_tasks_completed);

        self.avg_task_time = (self.avg_task_time * n + task.actual_duration) / (n + 1.0);
        self.task_est_factor = (self.task_est_factor * n + ratio) / (n + 1.0);

        if task.is_over() {
            self.total_over_tasks += 1;
        } else {
            self.total_under_tasks += 1;
        }
        self.total_tasks_completed += 1;
        Ok(())
    }

    /// Retract a task previously folded in with [`add_task`](Self::add_task).
    ///
    /// Removing the last task resets every counter to zero.
    pub fn remove_task(&mut self, task: &TaskRecord) -> EstimateResult<()> {
        let ratio = duration_ratio(task)?;

        if self.total_tasks_completed == 0 {
            return Err(EstimateError::invalid_input(
                "cannot remove a task from empty statistics",
            ));
        }
        let over = task.is_over();
        let bucket = if over {
            self.total_over_tasks
        } else {
            self.total_under_tasks
        };
        if bucket == 0 {
            return Err(EstimateError::invalid_input(format!(
                "task {} was never counted as {}",
                task.id,
                if over { "over" } else { "under" }
            )));
        }

        if self.total_tasks_completed == 1 {
            *self = AggregateStats::default();
            return Ok(());
        }

        let n = f64::from(self.total_tasks_completed);
        self.avg_task_time = (self.avg_task_time * n - task.actual_duration) / (n - 1.0);
        self.task_est_factor = (self.task_est_factor * n - ratio) / (n - 1.0);

        if over {
            self.total_over_tasks -= 1;
        } else {
            self.total_under_tasks -= 1;
        }
        self.total_tasks_completed -= 1;
        Ok(())
    }

    /// Apply an edit: retract `old`, then fold in `new`.
    ///
    /// Leaves `self` untouched if either step fails.
    pub fn replace_task(&mut self, old: &TaskRecord, new: &TaskRecord) -> EstimateResult<()> {
        let mut next = *self;
        next.remove_task(old)?;
        next.add_task(new)?;
        *self = next;
        Ok(())
    }

    /// Statistics over an arbitrary subset of tasks, e.g. all tasks with one tag.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a TaskRecord>) -> EstimateResult<Self> {
        let mut stats = AggregateStats::default();
        for task in tasks {
            stats.add_task(task)?;
        }
        Ok(stats)
    }

    /// `total_under_tasks + total_over_tasks == total_tasks_completed`.
    pub fn is_consistent(&self) -> bool {
        u64::from(self.total_under_tasks) + u64::from(self.total_over_tasks)
            == u64::from(self.total_tasks_completed)
    }
}

/// Running estimation factor after each task, in creation order.
pub fn estimation_timeseries(tasks: &[TaskRecord]) -> EstimateResult<Vec<TimeseriesPoint>> {
    let mut ordered: Vec<&TaskRecord> = tasks.iter().collect();
    ordered.sort_by_key(|t| t.created_at);

    let mut running = 0.0;
    let mut points = Vec::with_capacity(ordered.len());
    for (n, task) in ordered.into_iter().enumerate() {
        let ratio = duration_ratio(task)?;
        let n = n as f64;
        running = (running * n + ratio) / (n + 1.0);

        let name = DateTime::from_timestamp_millis(task.created_at)
            .ok_or_else(|| {
                EstimateError::invalid_input(format!(
                    "task {} has out-of-range timestamp {}",
                    task.id, task.created_at
                ))
            })?
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        points.push(TimeseriesPoint {
            name,
            value: running,
        });
    }
    Ok(points)
}
