use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use taskbreak::ai::{create_provider, DecompositionRequest, TaskBreakdown};
use taskbreak::api::{self, AppState, SecurityConfig};
use taskbreak::config::{AiConfig, ServerConfig};
use taskbreak::db::Database;
use taskbreak::models::Priority;

#[derive(Parser)]
#[command(name = "taskbreak")]
#[command(about = "Task backend that breaks tasks down into subtasks with an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Apply pending database migrations and exit
    Migrate,
    /// Break a stored task down into subtasks and print the result as JSON
    Breakdown {
        /// Id of the task to break down
        task_id: Uuid,

        /// Owner of the task
        #[arg(short, long)]
        user: String,

        /// Priority for every subtask instead of the inferred ones (low, medium, high)
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,
    },
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::from_str(s).ok_or_else(|| format!("unknown priority '{}': use low, medium or high", s))
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "taskbreak=debug,tower_http=debug".into()),
    );

    // Logs go to stderr so `breakdown` output on stdout stays clean JSON.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database() -> anyhow::Result<Database> {
    let db = match ServerConfig::from_env().db_path {
        Some(path) => Database::open(path)?,
        None => Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(host: &str, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting taskbreak server on {}:{}", host, port);

    let db = open_database()?;
    let ai_config = AiConfig::from_env();
    let provider = create_provider(&ai_config);
    let state = AppState::with_options(db, provider, ai_config.completion_options());

    let app = api::create_router_with_config(state, SecurityConfig::from_env());

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("taskbreak server listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve { host, port }) => serve(&host, port).await?,
        Some(Commands::Migrate) => {
            open_database()?;
            tracing::info!("Database is up to date");
        }
        Some(Commands::Breakdown {
            task_id,
            user,
            priority,
        }) => {
            let db = open_database()?;
            let ai_config = AiConfig::from_env();
            let provider = create_provider(&ai_config);
            let breakdown = TaskBreakdown::new(std::sync::Arc::new(db), provider)
                .with_options(ai_config.completion_options());

            let result = breakdown
                .decompose(DecompositionRequest {
                    task_id,
                    user_id: user,
                    priority_override: priority,
                })
                .await?;

            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        None => serve("127.0.0.1", 3000).await?,
    }

    Ok(())
}
