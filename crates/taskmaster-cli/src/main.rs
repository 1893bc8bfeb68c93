//! Taskmaster CLI
//!
//! Command-line interface for Taskmaster - tasks synced with a hosted backend.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use taskmaster_core::views::{DueWindow, TaskFilter};
use taskmaster_core::{Config, MonthView, Priority, TaskStatus};

mod commands;
mod output;
mod prompt;

use commands::task::TaskFields;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "taskmaster")]
#[command(about = "Taskmaster - tasks kept in sync with a hosted backend")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tasks
    #[command(alias = "ls")]
    List {
        /// Only tasks with this status
        #[arg(short, long)]
        status: Option<TaskStatus>,
        /// Only tasks with this tag (id or name)
        #[arg(short, long)]
        tag: Option<String>,
        /// Case-insensitive text search over title and description
        #[arg(short = 'S', long)]
        search: Option<String>,
        /// Due window: overdue, today or week
        #[arg(short, long)]
        due: Option<DueWindow>,
    },
    /// Show task details
    Show {
        /// Task ID (full or prefix)
        id: String,
    },
    /// Create a task
    #[command(alias = "create")]
    Add {
        /// Task title
        title: String,
        #[command(flatten)]
        fields: FieldArgs,
        /// Tag ids to attach
        #[arg(short, long)]
        tag: Vec<String>,
    },
    /// Edit a task (prompts for each field when no flags are given)
    Edit {
        /// Task ID (full or prefix)
        id: String,
        /// New title
        #[arg(short = 'T', long)]
        title: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Move a task to another board column
    #[command(alias = "mv")]
    Move {
        /// Task ID (full or prefix)
        id: String,
        /// Target status: pending, in-progress or completed
        status: TaskStatus,
    },
    /// Move a task to another day, keeping its time of day
    Reschedule {
        /// Task ID (full or prefix)
        id: String,
        /// New due date (YYYY-MM-DD)
        date: NaiveDate,
    },
    /// Manage subtasks
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommands,
    },
    /// Delete a task
    #[command(alias = "rm")]
    Delete {
        /// Task ID (full or prefix)
        id: String,
    },
    /// Show tasks grouped by status
    Board,
    /// Show a month with due tasks
    Calendar {
        /// Month to show (YYYY-MM), defaults to the current month
        #[arg(short, long)]
        month: Option<MonthView>,
    },
    /// Show productivity statistics
    Stats {
        /// Write a CSV export into this directory instead of printing
        #[arg(long, value_name = "DIR")]
        export: Option<PathBuf>,
    },
    /// Refetch all tasks from the backend
    Sync,
    /// Show the board and keep it updated until Ctrl-C
    Watch,
    /// Show backend, account and cache status
    Status,
    /// Log in and remember the session
    Login {
        /// Account email
        email: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Create an account
    Signup {
        /// Account email
        email: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

/// Field flags shared by add and edit
#[derive(clap::Args)]
struct FieldArgs {
    /// Description
    #[arg(short = 'D', long)]
    description: Option<String>,
    /// Due date (YYYY-MM-DD or RFC 3339)
    #[arg(short, long)]
    due: Option<String>,
    /// Priority: low, medium, high (or 1-3)
    #[arg(short, long)]
    priority: Option<Priority>,
    /// Status: pending, in-progress or completed
    #[arg(short, long)]
    status: Option<TaskStatus>,
}

impl FieldArgs {
    fn into_fields(self, title: Option<String>, tags: Vec<String>) -> TaskFields {
        TaskFields {
            title,
            description: self.description,
            due: self.due,
            priority: self.priority,
            status: self.status,
            tags,
        }
    }
}

#[derive(Subcommand)]
enum SubtaskCommands {
    /// Add a subtask
    Add {
        /// Task ID (full or prefix)
        id: String,
        /// Subtask text
        text: String,
    },
    /// Toggle a subtask between done and not done
    Toggle {
        /// Task ID (full or prefix)
        id: String,
        /// Subtask ID (full or prefix)
        subtask_id: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (backend_url, collection, cache_enabled, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work even when the config file is broken
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, &output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    // Account commands don't need the store
    match cli.command {
        Commands::Login { email, password } => {
            return commands::auth::login(config, config_path, email, password, &output).await;
        }
        Commands::Logout => return commands::auth::logout(config, config_path, &output),
        Commands::Signup { email, password } => {
            return commands::auth::signup(&config, email, password, &output).await;
        }
        _ => {}
    }

    let store = commands::open_store(&config);

    match cli.command {
        Commands::List {
            status,
            tag,
            search,
            due,
        } => {
            let filter = TaskFilter {
                status,
                tag,
                text: search,
                due,
            };
            commands::task::list(&store, filter, &output).await
        }
        Commands::Show { id } => commands::task::show(&store, id, &output).await,
        Commands::Add { title, fields, tag } => {
            commands::task::add(&store, title, fields.into_fields(None, tag), &output).await
        }
        Commands::Edit { id, title, fields } => {
            commands::task::edit(&store, id, fields.into_fields(title, Vec::new()), &output).await
        }
        Commands::Move { id, status } => commands::task::move_to(&store, id, status, &output).await,
        Commands::Reschedule { id, date } => {
            commands::task::reschedule(&store, id, date, &output).await
        }
        Commands::Subtask { command } => match command {
            SubtaskCommands::Add { id, text } => {
                commands::task::subtask_add(&store, id, text, &output).await
            }
            SubtaskCommands::Toggle { id, subtask_id } => {
                commands::task::subtask_toggle(&store, id, subtask_id, &output).await
            }
        },
        Commands::Delete { id } => commands::task::delete(&store, id, &output).await,
        Commands::Board => commands::board::show(&store, &output).await,
        Commands::Calendar { month } => commands::calendar::show(&store, month, &output).await,
        Commands::Stats { export } => commands::stats::show(&store, export, &output).await,
        Commands::Sync => commands::sync::sync(&store, &output).await,
        Commands::Watch => commands::sync::watch(&store, &config, &output).await,
        Commands::Status => commands::status::show(&store, &config, &output).await,
        Commands::Login { .. }
        | Commands::Logout
        | Commands::Signup { .. }
        | Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Initialize logging from TASKMASTER_LOG (default "warn")
///
/// Logs go to stderr, or to `log_file` without colors when one is configured.
fn init_logging(config: &Config) {
    let log_level = std::env::var("TASKMASTER_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = EnvFilter::new(format!(
        "taskmaster_core={},taskmaster={}",
        log_level, log_level
    ));

    let Some(ref log_path) = config.log_file else {
        // Ignore error if already initialized
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    let log_file = match File::options().create(true).append(true).open(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("logging initialized to {:?}", log_path);
}
