pub mod users;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "DayCheck", about = "Personal daily period checklist")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the checklist web server in the foreground
    Serve,
    Status,
    Doctor,
    /// Clear the previous day's checkmarks now
    Reset {
        /// Treat this date (YYYY-MM-DD) as today
        #[arg(long)]
        today: Option<String>,
    },
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum UserCommands {
    Add {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    List,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
