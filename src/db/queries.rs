pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id       INTEGER PRIMARY KEY AUTOINCREMENT,
  username TEXT NOT NULL UNIQUE,
  password TEXT
);
"#;

pub const CREATE_SCHEDULES: &str = r#"
CREATE TABLE IF NOT EXISTS schedules (
  id      INTEGER PRIMARY KEY AUTOINCREMENT,
  date    TEXT NOT NULL,
  user_id INTEGER NOT NULL REFERENCES users(id),
  period1 INTEGER NOT NULL DEFAULT 0,
  period2 INTEGER NOT NULL DEFAULT 0,
  period3 INTEGER NOT NULL DEFAULT 0,
  period4 INTEGER NOT NULL DEFAULT 0
);
"#;

pub const UNIQUE_SCHEDULES_USER_DATE: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_schedules_user_date ON schedules(user_id, date);";

pub const INDEX_SCHEDULES_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_schedules_date ON schedules(date);";

pub const SELECT_SCHEDULE_COLUMNS: &str =
    "SELECT id, user_id, date, period1, period2, period3, period4 FROM schedules";

pub const SELECT_USER_COLUMNS: &str = "SELECT id, username, password FROM users";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_SCHEDULES,
        UNIQUE_SCHEDULES_USER_DATE,
        INDEX_SCHEDULES_DATE,
    ]
}
