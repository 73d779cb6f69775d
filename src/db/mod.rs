pub mod queries;

use crate::schedule::Periods;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRow {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub periods: Periods,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;

        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn insert_user(&self, username: &str, password: Option<&str>) -> Result<UserRow> {
        self.conn
            .execute(
                "INSERT INTO users (username, password) VALUES (?1, ?2)",
                params![username, password],
            )
            .with_context(|| format!("Failed to insert user: {username}"))?;

        Ok(UserRow {
            id: self.conn.last_insert_rowid(),
            username: username.to_string(),
            password: password.map(ToOwned::to_owned),
        })
    }

    // Credential-less; a taken name is left as is.
    pub fn ensure_user(&self, username: &str) -> Result<UserRow> {
        self.conn
            .execute(
                "INSERT INTO users (username) VALUES (?1) ON CONFLICT(username) DO NOTHING",
                params![username],
            )
            .with_context(|| format!("Failed to bootstrap user: {username}"))?;

        self.user_by_name(username)?
            .with_context(|| format!("User missing after bootstrap: {username}"))
    }

    pub fn user_by_name(&self, username: &str) -> Result<Option<UserRow>> {
        let sql = format!("{} WHERE username = ?1", queries::SELECT_USER_COLUMNS);
        self.conn
            .query_row(&sql, params![username], map_user)
            .optional()
            .with_context(|| format!("Failed to look up user: {username}"))
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        let sql = format!("{} WHERE id = ?1", queries::SELECT_USER_COLUMNS);
        self.conn
            .query_row(&sql, params![id], map_user)
            .optional()
            .with_context(|| format!("Failed to look up user id: {id}"))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        let sql = format!("{} ORDER BY id ASC", queries::SELECT_USER_COLUMNS);
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map([], map_user)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list users")?;

        Ok(rows)
    }

    pub fn count_users(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .context("Failed to count users")
    }

    pub fn schedule(&self, user_id: i64, date: NaiveDate) -> Result<Option<ScheduleRow>> {
        let sql = format!(
            "{} WHERE user_id = ?1 AND date = ?2",
            queries::SELECT_SCHEDULE_COLUMNS
        );
        self.conn
            .query_row(&sql, params![user_id, date], map_schedule)
            .optional()
            .context("Failed to query schedule")
    }

    pub fn insert_schedule_if_absent(&self, user_id: i64, date: NaiveDate) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT INTO schedules (date, user_id) VALUES (?1, ?2)
                 ON CONFLICT(user_id, date) DO NOTHING",
                params![date, user_id],
            )
            .context("Failed to insert schedule")?;

        Ok(inserted > 0)
    }

    pub fn schedules_for_date(&self, date: NaiveDate) -> Result<Vec<ScheduleRow>> {
        let sql = format!(
            "{} WHERE date = ?1 ORDER BY user_id ASC",
            queries::SELECT_SCHEDULE_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![date], map_schedule)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query schedules")?;

        Ok(rows)
    }

    pub fn count_schedules(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM schedules", [], |row| row.get(0))
            .context("Failed to count schedules")
    }

    pub fn clear_schedules_for_date(&mut self, date: NaiveDate) -> Result<usize> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        let cleared = transaction
            .execute(
                "UPDATE schedules
                 SET period1 = 0, period2 = 0, period3 = 0, period4 = 0
                 WHERE date = ?1",
                params![date],
            )
            .context("Failed to clear schedules")?;

        transaction
            .commit()
            .context("Failed to commit schedule reset")?;

        Ok(cleared)
    }

    pub fn update_periods(&mut self, schedule_id: i64, periods: Periods) -> Result<()> {
        let [period1, period2, period3, period4] = periods.as_array();
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        transaction
            .execute(
                "UPDATE schedules
                 SET period1 = ?1, period2 = ?2, period3 = ?3, period4 = ?4
                 WHERE id = ?5",
                params![period1, period2, period3, period4, schedule_id],
            )
            .context("Failed to update schedule periods")?;

        transaction
            .commit()
            .context("Failed to commit schedule periods")?;

        Ok(())
    }
}

pub fn is_constraint_violation(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<rusqlite::Error>()
        .and_then(rusqlite::Error::sqlite_error_code)
        == Some(ErrorCode::ConstraintViolation)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
    })
}

fn map_schedule(row: &Row<'_>) -> rusqlite::Result<ScheduleRow> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        periods: Periods::new([row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?]),
    })
}
