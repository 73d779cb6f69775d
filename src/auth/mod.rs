pub mod session;

use crate::db::{Database, UserRow, is_constraint_violation};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username already exists")]
    DuplicateUsername,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("username and password are required")]
    MissingField,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

// Exact, case-sensitive plaintext comparison. Credentials are stored as entered;
// anything beyond a personal machine needs a salted one-way hash instead.
pub fn authenticate(
    database: &Database,
    username: &str,
    password: &str,
) -> Result<UserRow, AuthError> {
    let user = database
        .user_by_name(username)?
        .filter(|user| user.password.as_deref() == Some(password));

    match user {
        Some(user) => {
            info!(username, "login succeeded");
            Ok(user)
        }
        None => {
            warn!(username, "login rejected");
            Err(AuthError::InvalidCredentials)
        }
    }
}

pub fn register(database: &Database, username: &str, password: &str) -> Result<UserRow, AuthError> {
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::MissingField);
    }

    // The UNIQUE index decides, so a concurrent `user add` cannot slip in between.
    let user = database
        .insert_user(username, Some(password))
        .map_err(|error| {
            if is_constraint_violation(&error) {
                AuthError::DuplicateUsername
            } else {
                AuthError::Store(error)
            }
        })?;
    info!(username, user_id = user.id, "user registered");

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::{AuthError, authenticate, register};
    use crate::db::Database;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Database) {
        let dir = tempfile::tempdir().expect("temp dir");
        let database = Database::open(&dir.path().join("schedule.db")).expect("open db");
        (dir, database)
    }

    #[test]
    fn register_twice_keeps_single_row() {
        let (_dir, database) = open_temp();

        register(&database, "alice", "secret").expect("first registration");
        let second = register(&database, "alice", "other");

        assert!(matches!(second, Err(AuthError::DuplicateUsername)));
        assert_eq!(database.count_users().expect("count"), 1);
    }

    #[test]
    fn authenticate_requires_exact_password() {
        let (_dir, database) = open_temp();

        assert!(matches!(
            authenticate(&database, "alice", "secret"),
            Err(AuthError::InvalidCredentials)
        ));

        let registered = register(&database, "alice", "secret").expect("register");
        let user = authenticate(&database, "alice", "secret").expect("login");
        assert_eq!(user.id, registered.id);

        assert!(authenticate(&database, "alice", "Secret").is_err());
        assert!(authenticate(&database, "alice", "secret ").is_err());
        assert!(authenticate(&database, "Alice", "secret").is_err());
    }

    #[test]
    fn bootstrap_users_cannot_log_in() {
        let (_dir, database) = open_temp();
        database.ensure_user("sohn1").expect("user");

        assert!(matches!(
            authenticate(&database, "sohn1", ""),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn register_rejects_empty_fields() {
        let (_dir, database) = open_temp();

        assert!(matches!(
            register(&database, "", "secret"),
            Err(AuthError::MissingField)
        ));
        assert!(matches!(
            register(&database, "alice", ""),
            Err(AuthError::MissingField)
        ));
        assert_eq!(database.count_users().expect("count"), 0);
    }

    #[test]
    fn error_messages_match_notices() {
        assert_eq!(AuthError::DuplicateUsername.to_string(), "username already exists");
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid username or password"
        );
    }
}
