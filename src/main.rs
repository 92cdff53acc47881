use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tasklist::client::{ApiClient, ClientError, SessionFile, TaskListSync};
use tasklist::tasks::Task;
use tasklist::Config;
use tracing_subscriber::EnvFilter;

/// Personal task list: run the API or talk to it.
#[derive(Parser, Debug)]
#[command(name = "tasklist", version, about)]
struct Cli {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API base URL (overrides config and the saved session)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create an account
    Register {
        username: String,
        /// Read from stdin when omitted
        password: Option<String>,
    },
    /// Log in and remember the token
    Login {
        username: String,
        /// Read from stdin when omitted
        password: Option<String>,
    },
    /// Forget the saved token
    Logout,
    #[command(flatten)]
    Task(TaskCommand),
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Show your tasks
    List,
    /// Add a task
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Flip a task between open and done
    Toggle { id: i64 },
    /// Delete a task
    Rm { id: i64 },
    /// Move a task to a 1-based slot
    Mv { id: i64, to: usize },
    /// Set the full order by listing ids
    Order {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if matches!(cli.command, Command::Serve { .. }) {
        "tasklist=info,tower_http=info"
    } else {
        "tasklist=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            tasklist::gateway::run_gateway(&config).await
        }
        command => run_client(command, cli.server, &config).await,
    }
}

async fn run_client(command: Command, server: Option<String>, config: &Config) -> Result<()> {
    let session_path = config.session_path();
    let session = SessionFile::load(&session_path)?;
    let server_url = server
        .or_else(|| session.as_ref().map(|s| s.server_url.clone()))
        .unwrap_or_else(|| config.client.server_url.clone());
    let client = ApiClient::new(&server_url)?;

    let command = match command {
        Command::Register { username, password } => {
            let password = password_or_prompt(password)?;
            client.register(&username, &password).await?;
            println!("Registered {username}. Log in with `tasklist login {username}`.");
            return Ok(());
        }
        Command::Login { username, password } => {
            let password = password_or_prompt(password)?;
            let login = client.login(&username, &password).await?;
            SessionFile {
                server_url: client.base_url().to_string(),
                token: login.token,
                username: login.username.clone(),
            }
            .save(&session_path)?;
            println!("Logged in as {}.", login.username);
            return Ok(());
        }
        Command::Logout => {
            if SessionFile::clear(&session_path)? {
                println!("Logged out.");
            } else {
                println!("Not logged in.");
            }
            return Ok(());
        }
        Command::Serve { .. } => bail!("`serve` is not a client command"),
        Command::Task(command) => command,
    };

    let session = session.ok_or(ClientError::NotLoggedIn)?;
    let mut sync = TaskListSync::new(client.with_token(session.token));
    sync.refresh().await?;

    match command {
        TaskCommand::List => {}
        TaskCommand::Add { text } => {
            let task = sync.add(&text.join(" ")).await?;
            println!("Added #{}.", task.id);
        }
        TaskCommand::Toggle { id } => {
            let task = sync.toggle(id).await?;
            let state = if task.completed { "done" } else { "open" };
            println!("#{id} is now {state}.");
        }
        TaskCommand::Rm { id } => {
            sync.delete(id).await?;
            println!("Deleted #{id}.");
        }
        TaskCommand::Mv { id, to } => {
            if to == 0 {
                bail!("slots start at 1");
            }
            sync.move_task(id, to - 1).await?;
        }
        TaskCommand::Order { ids } => {
            sync.reorder(&ids).await?;
        }
    }

    print_tasks(sync.tasks());
    Ok(())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks yet. Add one with `tasklist add <text>`.");
        return;
    }
    for (slot, task) in tasks.iter().enumerate() {
        let mark = if task.completed { "x" } else { " " };
        println!("{:>3}. [{mark}] {}  (#{})", slot + 1, task.text, task.id);
    }
}
