//! Owner (user/team) CRUD and statistics persistence.

use super::{Database, now_ms};
use crate::error::{CliError, EstimateError};
use crate::types::{AggregateStats, Owner, OwnerKind};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

const OWNER_COLUMNS: &str = "id, name, kind, total_tasks_completed, total_under_tasks,
     total_over_tasks, avg_task_time, task_est_factor, created_at, updated_at";

pub fn parse_owner_row(row: &Row) -> rusqlite::Result<Owner> {
    let kind: String = row.get("kind")?;
    Ok(Owner {
        id: row.get("id")?,
        name: row.get("name")?,
        kind: OwnerKind::from_str(&kind).unwrap_or_default(),
        stats: AggregateStats {
            total_tasks_completed: row.get("total_tasks_completed")?,
            total_under_tasks: row.get("total_under_tasks")?,
            total_over_tasks: row.get("total_over_tasks")?,
            avg_task_time: row.get("avg_task_time")?,
            task_est_factor: row.get("task_est_factor")?,
        },
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Get an owner using an existing connection (avoids deadlock).
pub(crate) fn get_owner_internal(conn: &Connection, owner_id: &str) -> Result<Option<Owner>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM owners WHERE id = ?1", OWNER_COLUMNS))?;

    match stmt.query_row(params![owner_id], parse_owner_row) {
        Ok(owner) => Ok(Some(owner)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Get an owner or fail with `OWNER_NOT_FOUND`.
pub(crate) fn require_owner(conn: &Connection, owner_id: &str) -> Result<Owner> {
    get_owner_internal(conn, owner_id)?.ok_or_else(|| CliError::owner_not_found(owner_id).into())
}

/// Persist updated statistics for an owner.
pub(crate) fn write_stats(conn: &Connection, owner_id: &str, stats: &AggregateStats) -> Result<()> {
    conn.execute(
        "UPDATE owners SET
            total_tasks_completed = ?1, total_under_tasks = ?2, total_over_tasks = ?3,
            avg_task_time = ?4, task_est_factor = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            stats.total_tasks_completed,
            stats.total_under_tasks,
            stats.total_over_tasks,
            stats.avg_task_time,
            stats.task_est_factor,
            now_ms(),
            owner_id,
        ],
    )?;
    Ok(())
}

impl Database {
    /// Create a user or team. Names are unique per kind.
    pub fn create_owner(&self, name: &str, kind: OwnerKind) -> Result<Owner> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EstimateError::invalid_input("owner name must not be empty").into());
        }
        let id = Uuid::now_v7().to_string();
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM owners WHERE kind = ?1 AND name = ?2)",
                params![kind.as_str(), name],
                |row| row.get(0),
            )?;
            if exists {
                return Err(CliError::already_exists(
                    if kind == OwnerKind::Team { "Team" } else { "User" },
                    name,
                )
                .into());
            }

            tx.execute(
                "INSERT INTO owners (id, name, kind, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![&id, name, kind.as_str(), now, now],
            )?;
            tx.commit()?;

            Ok(Owner {
                id,
                name: name.to_string(),
                kind,
                stats: AggregateStats::default(),
                created_at: now,
                updated_at: now,
            })
        })
    }

    pub fn get_owner(&self, owner_id: &str) -> Result<Option<Owner>> {
        self.with_conn(|conn| get_owner_internal(conn, owner_id))
    }

    /// Look an owner up by kind and name.
    pub fn find_owner(&self, kind: OwnerKind, name: &str) -> Result<Option<Owner>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM owners WHERE kind = ?1 AND name = ?2",
                OWNER_COLUMNS
            ))?;
            match stmt.query_row(params![kind.as_str(), name], parse_owner_row) {
                Ok(owner) => Ok(Some(owner)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Resolve an id, then a user name, then a team name.
    pub fn resolve_owner(&self, key: &str) -> Result<Owner> {
        if let Some(owner) = self.get_owner(key)? {
            return Ok(owner);
        }
        if let Some(owner) = self.find_owner(OwnerKind::User, key)? {
            return Ok(owner);
        }
        if let Some(owner) = self.find_owner(OwnerKind::Team, key)? {
            return Ok(owner);
        }
        Err(CliError::owner_not_found(key).into())
    }

    /// List owners ordered by name, optionally of one kind.
    pub fn list_owners(&self, kind: Option<OwnerKind>) -> Result<Vec<Owner>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM owners WHERE (?1 IS NULL OR kind = ?1) ORDER BY name, kind",
                OWNER_COLUMNS
            ))?;
            let owners = stmt
                .query_map(params![kind.map(|k| k.as_str())], parse_owner_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(owners)
        })
    }

    /// Delete an owner with all its tasks. Returns false if it did not exist.
    pub fn delete_owner(&self, owner_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM owners WHERE id = ?1", params![owner_id])?;
            Ok(deleted > 0)
        })
    }

    /// Statistics for an owner, or for the subset of its tasks carrying `tag`.
    pub fn owner_stats(&self, owner_id: &str, tag: Option<&str>) -> Result<AggregateStats> {
        match tag {
            None => {
                let owner = self.with_conn(|conn| require_owner(conn, owner_id))?;
                Ok(owner.stats)
            }
            Some(tag) => {
                let tasks = self.list_tasks(owner_id, Some(tag))?;
                Ok(AggregateStats::from_tasks(&tasks)?)
            }
        }
    }
}
