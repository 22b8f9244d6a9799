mod config_commands;
mod context;
mod project_commands;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::{
    config_commands::{ConfigAction, handle_config},
    context::AppContext,
    project_commands::{ProjectAction, handle_projects},
};

#[derive(Parser)]
#[command(name = "paraman", about = "paraman — track a projects directory and archive finished projects")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/paraman/).
    #[arg(long, global = true, env = "PARAMAN_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Projects(ProjectAction),
    /// Configuration file management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Initialise tracing. Logs go to stderr so listings on stdout stay clean.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "paraman starting");

    // Apply directory overrides before loading config
    if let Some(ref dir) = cli.config_dir {
        paraman_config::set_config_dir(dir.clone());
    }
    let action = match cli.command {
        Some(Commands::Config { action }) => return handle_config(action),
        Some(Commands::Projects(action)) => action,
        None => ProjectAction::Status,
    };

    let config = paraman_config::discover_and_load();
    let ctx = AppContext::bootstrap(&config).await?;
    let result = handle_projects(&ctx, action).await;
    ctx.shutdown().await;
    result
}
