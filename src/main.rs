mod api;
mod auth;
mod cli;
mod config;
mod db;
mod identity;
mod schedule;

use crate::cli::{Cli, Commands, ConfigCommands, UserCommands};
use crate::config::Config;
use crate::db::Database;
use crate::schedule::clock;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_or_default_config()?;
            run_service(config).await
        }
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Reset { today } => handle_reset(today),
        Commands::User { command } => handle_user_command(command),
        Commands::Config { command } => handle_config_command(command),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_user_command(command: UserCommands) -> Result<()> {
    let config = load_or_default_config()?;

    match command {
        UserCommands::Add { username, password } => {
            cli::users::add_user(&config, &username, password)
        }
        UserCommands::List => cli::users::list_users(&config),
    }
}

fn handle_status() -> Result<()> {
    let config = load_or_default_config()?;
    let database = Database::open(&config.db_path)?;
    let today = clock::today();

    println!("DayCheck status");
    println!("- timezone: {}", clock::TIMEZONE.name());
    println!("- today: {today}");
    println!("- identity_mode: {}", config.identity_mode);
    println!("- users: {}", database.count_users()?);
    println!("- schedule records: {}", database.count_schedules()?);

    let users = database.list_users()?;
    for row in database.schedules_for_date(today)? {
        let username = users
            .iter()
            .find(|user| user.id == row.user_id)
            .map(|user| user.username.as_str())
            .unwrap_or("?");
        let marks = row
            .periods
            .as_array()
            .iter()
            .map(|checked| if *checked { "x" } else { "-" })
            .collect::<String>();
        println!("  {username}: [{marks}]");
    }

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found, defaults apply: {}", config_path.display());
        issues.push("config missing");
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable");
        }
    }

    if config.fixed_users.is_empty() && config.identity_mode == identity::IdentityMode::Fixed {
        println!("[WARN] identity_mode is fixed but fixed_users is empty");
        issues.push("no fixed users");
    } else {
        println!("[OK] identity_mode: {}", config.identity_mode);
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_reset(today: Option<String>) -> Result<()> {
    let config = load_or_default_config()?;
    let today = parse_optional_date(today)?;
    let mut database = Database::open(&config.db_path)?;

    let cleared = schedule::reset_previous_day(&mut database, today)?;
    println!(
        "Reset {cleared} schedule(s) dated {}",
        clock::previous_day(today)?
    );

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    let database = Database::open(&config.db_path)?;
    identity::bootstrap_users(&database, &config)?;

    info!(
        identity_mode = %config.identity_mode,
        timezone = clock::TIMEZONE.name(),
        "DayCheck service started"
    );

    tokio::select! {
        api_result = api::run_server(Arc::new(config), database) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2024-01-11"))
        })
        .transpose()?
        .map_or_else(|| Ok(clock::today()), Ok)
}

fn load_or_default_config() -> Result<Config> {
    let config_path = Config::config_path()?;
    if !config_path.exists() {
        return Ok(Config::default());
    }

    Config::load()
}
