use crate::auth::{self, AuthError};
use crate::config::Config;
use crate::db::Database;
use crate::identity::IdentityMode;
use anyhow::{Context, Result, bail};
use dialoguer::{Password, theme::ColorfulTheme};

pub fn add_user(config: &Config, username: &str, password: Option<String>) -> Result<()> {
    let database = Database::open(&config.db_path)?;

    if config.identity_mode == IdentityMode::Fixed && password.is_none() {
        let user = database.ensure_user(username)?;
        println!("User ready: {} (id {})", user.username, user.id);
        println!("Add it to identity.fixed_users to show it on the page.");
        return Ok(());
    }

    let password = match password {
        Some(value) => value,
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Password for {username}"))
            .with_confirmation("Repeat password", "Passwords do not match")
            .interact()
            .context("Failed to read password")?,
    };

    match auth::register(&database, username, &password) {
        Ok(user) => {
            println!("User registered: {} (id {})", user.username, user.id);
            Ok(())
        }
        Err(AuthError::Store(error)) => Err(error),
        Err(error) => bail!("{error}"),
    }
}

pub fn list_users(config: &Config) -> Result<()> {
    let database = Database::open(&config.db_path)?;
    let users = database.list_users()?;

    if users.is_empty() {
        println!("No users yet");
        return Ok(());
    }

    for user in users {
        let login = if user.password.is_some() {
            "login"
        } else {
            "fixed"
        };
        println!("{:>4}  {:<24} {login}", user.id, user.username);
    }

    Ok(())
}
