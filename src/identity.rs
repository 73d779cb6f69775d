use crate::auth::session::SessionState;
use crate::config::Config;
use crate::db::{Database, UserRow};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    #[default]
    Fixed,
    Login,
}

impl FromStr for IdentityMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "fixed" => Ok(Self::Fixed),
            "login" => Ok(Self::Login),
            other => bail!("identity_mode must be fixed or login, got: {other}"),
        }
    }
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("fixed"),
            Self::Login => f.write_str("login"),
        }
    }
}

pub fn bootstrap_users(database: &Database, config: &Config) -> Result<()> {
    if config.identity_mode != IdentityMode::Fixed {
        return Ok(());
    }

    for username in &config.fixed_users {
        let user = database.ensure_user(username)?;
        info!(username, user_id = user.id, "fixed user ready");
    }

    Ok(())
}

pub fn visible_users(
    database: &Database,
    config: &Config,
    session: &SessionState,
) -> Result<Vec<UserRow>> {
    match config.identity_mode {
        IdentityMode::Fixed => config
            .fixed_users
            .iter()
            .map(|username| database.ensure_user(username))
            .collect(),
        IdentityMode::Login => Ok(session.user().cloned().into_iter().collect()),
    }
}

pub fn may_edit(
    database: &Database,
    config: &Config,
    session: &SessionState,
    user_id: i64,
) -> Result<bool> {
    let allowed = visible_users(database, config, session)?
        .iter()
        .any(|user| user.id == user_id);

    Ok(allowed)
}
