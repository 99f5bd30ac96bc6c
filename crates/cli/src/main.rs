//! tareas CLI - manage tasks on a tareas server.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tareas_client::{
    Action, ApiError, ClientConfig, Confirmation, Credentials, Dispatcher, Notice, Outcome,
    SessionManager, TaskBoard, TaskService, TaskSyncClient,
};
use tareas_core::TaskId;
use tareas_storage::JsonTokenStore;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tareas")]
#[command(about = "Manage tasks on a tareas server", long_about = None)]
struct Cli {
    /// Base URL of the tareas server
    #[arg(long, env = "TAREAS_API_URL", global = true)]
    api_url: Option<String>,

    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the session
    Login {
        /// Account email
        username: String,
        /// Password (prompted for if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account
    Register {
        /// Account email
        email: String,
        /// Password (prompted for if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the session
    Logout,
    /// Show who is logged in
    Whoami,
    /// List tasks
    List,
    /// Show task details
    Show {
        /// Task ID
        id: TaskId,
    },
    /// Add a new task
    Add {
        /// Title
        title: String,
        /// Description
        #[arg(long, short, default_value = "")]
        description: String,
    },
    /// Change a task's title or description
    Edit {
        /// Task ID
        id: TaskId,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long, short)]
        description: Option<String>,
    },
    /// Mark a task done, or not done again
    Toggle {
        /// Task ID
        id: TaskId,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: TaskId,
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// Assign a collaborator
    Assign {
        /// Task ID
        id: TaskId,
        /// Collaborator email
        email: String,
    },
    /// Unassign a collaborator
    Unassign {
        /// Task ID
        id: TaskId,
        /// Collaborator email
        email: String,
    },
    /// Check that the server is up
    Health,
}

fn init_logging() {
    // stdout carries the task list; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    if let Some(url) = cli.api_url {
        config = config.with_base_url(url);
    }

    debug!("Using {} with session in {}", config.base_url, config.session_dir.display());

    let store = Arc::new(JsonTokenStore::new(&config.session_dir));
    let session = Arc::new(SessionManager::restore(&config, store).await?);
    let client = TaskSyncClient::new(session.clone());

    let action = match cli.command {
        Commands::Login { username, password } => {
            let password = read_password(password)?;
            session
                .acquire(&Credentials::new(username.as_str(), password))
                .await
                .map_err(fail)?;
            let identity = session.display_identity().await.unwrap_or(username);
            println!("Logged in as {}.", identity);
            return Ok(());
        }
        Commands::Register { email, password } => {
            let password = read_password(password)?;
            session.register(&email, &password).await.map_err(fail)?;
            println!("Registered {}. Log in with `tareas login {}`.", email, email);
            return Ok(());
        }
        Commands::Show { id } => {
            let task = client.get(id).await.map_err(fail)?;
            println!("Task: {}", task.id);
            println!("  Title: {}", task.title);
            println!("  Description: {}", task.description);
            println!("  Completed: {}", if task.completed { "yes" } else { "no" });
            if !task.assignees.is_empty() {
                let emails: Vec<_> = task.assignees.iter().map(|u| u.email.as_str()).collect();
                println!("  Assignees: {}", emails.join(", "));
            }
            return Ok(());
        }
        Commands::Health => {
            let status = client.health().await.map_err(fail)?;
            println!("{}: {}", config.base_url, status);
            return Ok(());
        }
        Commands::Logout => Action::Logout,
        Commands::Whoami => Action::WhoAmI,
        Commands::List => Action::List,
        Commands::Add { title, description } => Action::Add { title, description },
        Commands::Edit { id, title, description } => {
            if title.is_none() && description.is_none() {
                anyhow::bail!("nothing to change, pass --title and/or --description");
            }
            Action::Edit { id, title, description }
        }
        Commands::Toggle { id } => Action::Toggle { id },
        Commands::Delete { id, yes } => {
            let confirmed = yes || confirm(&format!("Delete task {}?", id))?;
            Action::Delete {
                id,
                confirmation: Confirmation::from(confirmed),
            }
        }
        Commands::Assign { id, email } => Action::Assign { id, email },
        Commands::Unassign { id, email } => Action::Unassign { id, email },
    };

    let dispatcher = Dispatcher::new(TaskBoard::new(client), session);
    show(dispatcher.dispatch(action).await)
}

fn show(outcome: Outcome) -> Result<()> {
    if let Some(view) = &outcome.view {
        print!("{}", view);
    }
    match outcome.notice {
        Some(notice) if notice.is_error() => anyhow::bail!("{}", notice),
        Some(notice) => println!("{}", notice),
        None => {}
    }
    Ok(())
}

fn fail(err: ApiError) -> anyhow::Error {
    anyhow::anyhow!("{}", Notice::from(&err))
}

fn read_password(given: Option<String>) -> Result<String> {
    match given {
        Some(password) => Ok(password),
        None => Ok(rpassword::prompt_password("Password: ")?),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
