pub mod clock;

use crate::db::{Database, ScheduleRow};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

pub const PERIOD_COUNT: usize = 4;

pub const PERIOD_LABELS: [&str; PERIOD_COUNT] = ["Period 1", "Period 2", "Period 3", "Period 4"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Periods([bool; PERIOD_COUNT]);

impl Periods {
    pub fn new(flags: [bool; PERIOD_COUNT]) -> Self {
        Self(flags)
    }

    pub fn as_array(self) -> [bool; PERIOD_COUNT] {
        self.0
    }

    pub fn with(mut self, index: usize, value: bool) -> Self {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = value;
        }
        self
    }

    pub fn is_clear(self) -> bool {
        self.0.iter().all(|flag| !flag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Unchanged,
}

// Only the day before `today` is touched; older records keep their flags.
pub fn reset_previous_day(database: &mut Database, today: NaiveDate) -> Result<usize> {
    let yesterday = clock::previous_day(today)?;
    let cleared = database.clear_schedules_for_date(yesterday)?;

    if cleared > 0 {
        info!(date = %yesterday, cleared, "previous day schedules reset");
    }

    Ok(cleared)
}

pub fn reset_for_now(database: &mut Database, now: DateTime<Utc>) -> Result<usize> {
    reset_previous_day(database, clock::local_date(now))
}

pub fn get_or_create(database: &Database, user_id: i64, date: NaiveDate) -> Result<ScheduleRow> {
    if database.insert_schedule_if_absent(user_id, date)? {
        info!(user_id, date = %date, "schedule record created");
    }

    database
        .schedule(user_id, date)?
        .with_context(|| format!("Schedule missing after insert: user={user_id}, date={date}"))
}

pub fn save_on_change(
    database: &mut Database,
    record: &mut ScheduleRow,
    displayed: Periods,
) -> Result<SaveOutcome> {
    if record.periods == displayed {
        return Ok(SaveOutcome::Unchanged);
    }

    database.update_periods(record.id, displayed)?;
    record.periods = displayed;
    info!(
        user_id = record.user_id,
        date = %record.date,
        periods = ?displayed.as_array(),
        "schedule saved"
    );

    Ok(SaveOutcome::Saved)
}
