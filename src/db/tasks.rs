//! Task lifecycle with exact statistics bookkeeping.
//!
//! Each mutation loads the owner, applies the matching
//! [`AggregateStats`](crate::types::AggregateStats) update and writes task,
//! tags and statistics in one transaction.

use super::owners::{require_owner, write_stats};
use super::{Database, now_ms};
use crate::error::CliError;
use crate::types::TaskRecord;
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Fields to change on an existing task. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub expected_duration: Option<f64>,
    pub actual_duration: Option<f64>,
    pub tags: Option<Vec<String>>,
}

/// Replace all tags of a task.
fn sync_task_tags(conn: &Connection, task_id: &str, tags: &BTreeSet<String>) -> Result<()> {
    conn.execute("DELETE FROM task_tags WHERE task_id = ?1", params![task_id])?;
    for tag in tags {
        conn.execute(
            "INSERT INTO task_tags (task_id, tag) VALUES (?1, ?2)",
            params![task_id, tag],
        )?;
    }
    Ok(())
}

fn load_tags(conn: &Connection, task_id: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare_cached("SELECT tag FROM task_tags WHERE task_id = ?1")?;
    let tags = stmt
        .query_map(params![task_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;
    Ok(tags)
}

fn parse_task_row(row: &Row) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        expected_duration: row.get("expected_duration")?,
        actual_duration: row.get("actual_duration")?,
        created_at: row.get("created_at")?,
        tags: BTreeSet::new(),
    })
}

/// Get a task with its tags using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<TaskRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, expected_duration, actual_duration, created_at
         FROM tasks WHERE id = ?1",
    )?;

    match stmt.query_row(params![task_id], parse_task_row) {
        Ok(mut task) => {
            task.tags = load_tags(conn, &task.id)?;
            Ok(Some(task))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn require_task(conn: &Connection, task_id: &str) -> Result<TaskRecord> {
    get_task_internal(conn, task_id)?.ok_or_else(|| CliError::task_not_found(task_id).into())
}

impl Database {
    /// Record a completed task and fold it into its owner's statistics.
    ///
    /// `created_at` defaults to now.
    pub fn add_task(
        &self,
        owner_id: &str,
        expected_duration: f64,
        actual_duration: f64,
        tags: Vec<String>,
        created_at: Option<i64>,
    ) -> Result<TaskRecord> {
        let now = now_ms();
        let task = TaskRecord::new(
            Uuid::now_v7().to_string(),
            owner_id,
            expected_duration,
            actual_duration,
            created_at.unwrap_or(now),
            tags,
        );

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owner = require_owner(&tx, owner_id)?;
            let mut stats = owner.stats;
            stats.add_task(&task)?;

            tx.execute(
                "INSERT INTO tasks (id, owner_id, expected_duration, actual_duration, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &task.id,
                    owner_id,
                    task.expected_duration,
                    task.actual_duration,
                    task.created_at,
                    now,
                ],
            )?;
            sync_task_tags(&tx, &task.id, &task.tags)?;
            write_stats(&tx, owner_id, &stats)?;

            tx.commit()?;
            Ok(task)
        })
    }

    /// Edit a task: its old values are retracted from the owner's
    /// statistics and the new ones folded in.
    pub fn update_task(&self, task_id: &str, update: TaskUpdate) -> Result<TaskRecord> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let old = require_task(&tx, task_id)?;
            let mut new = old.clone();
            if let Some(expected) = update.expected_duration {
                new.expected_duration = expected;
            }
            if let Some(actual) = update.actual_duration {
                new.actual_duration = actual;
            }
            if let Some(tags) = update.tags {
                new.tags = tags.into_iter().collect();
            }

            let owner = require_owner(&tx, &old.owner_id)?;
            let mut stats = owner.stats;
            stats.replace_task(&old, &new)?;

            tx.execute(
                "UPDATE tasks SET expected_duration = ?1, actual_duration = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![new.expected_duration, new.actual_duration, now_ms(), task_id],
            )?;
            sync_task_tags(&tx, task_id, &new.tags)?;
            write_stats(&tx, &old.owner_id, &stats)?;

            tx.commit()?;
            Ok(new)
        })
    }

    /// Delete a task and retract it from its owner's statistics.
    pub fn delete_task(&self, task_id: &str) -> Result<TaskRecord> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let task = require_task(&tx, task_id)?;
            let owner = require_owner(&tx, &task.owner_id)?;
            let mut stats = owner.stats;
            stats.remove_task(&task)?;

            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            write_stats(&tx, &task.owner_id, &stats)?;

            tx.commit()?;
            Ok(task)
        })
    }

    pub fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// An owner's tasks in creation order, optionally only those tagged `tag`.
    pub fn list_tasks(&self, owner_id: &str, tag: Option<&str>) -> Result<Vec<TaskRecord>> {
        self.with_conn(|conn| {
            require_owner(conn, owner_id)?;

            let mut stmt = conn.prepare(
                "SELECT id, owner_id, expected_duration, actual_duration, created_at
                 FROM tasks t
                 WHERE owner_id = ?1
                   AND (?2 IS NULL OR EXISTS(
                        SELECT 1 FROM task_tags tt WHERE tt.task_id = t.id AND tt.tag = ?2))
                 ORDER BY created_at, id",
            )?;
            let mut tasks = stmt
                .query_map(params![owner_id, tag], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            for task in &mut tasks {
                task.tags = load_tags(conn, &task.id)?;
            }
            Ok(tasks)
        })
    }
}
