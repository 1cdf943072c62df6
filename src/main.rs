use clap::{Parser, Subcommand};
use std::sync::Arc;

use slack_bridge::infrastructure::adapters::console::ConsoleRobot;
use slack_bridge::{BotError, Config, MemoryStore, SlackAdapter};

#[derive(Parser)]
#[command(name = "slack-bridge")]
#[command(about = "Relay Slack RTM events into a bot framework", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Slack token (overrides config)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Slack and print incoming messages
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => run_bot(&cli.config, cli.token),
        Commands::Version => {
            println!("slack-bridge v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(&cli.config),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(config_path: &str, token_override: Option<String>) -> Result<Config, BotError> {
    let mut config = if std::path::Path::new(config_path).exists() {
        Config::load(config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using environment", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    if let Some(token) = token_override {
        config.slack.token = token;
    }
    config.validate()?;
    Ok(config)
}

fn run_bot(config_path: &str, token_override: Option<String>) -> Result<(), BotError> {
    let config = load_config(config_path, token_override)?;
    tracing::info!("Starting slack-bridge: {}", config.bot.name);

    let robot = Arc::new(ConsoleRobot::new(&config.bot.name, &config.bot.mention_name));
    let store = Arc::new(MemoryStore::new());
    let adapter = SlackAdapter::new(config.slack, robot, store)?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| BotError::Internal(e.to_string()))?;
    rt.block_on(async {
        adapter.run().await?;

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        }
        tracing::info!("Shutting down");
        adapter.shut_down().await;
        Ok::<(), BotError>(())
    })
}

fn init_config(path: &str) -> Result<(), BotError> {
    if std::path::Path::new(path).exists() {
        println!("{} already exists, leaving it untouched", path);
        return Ok(());
    }

    let yaml = Config::default().to_yaml()?;
    std::fs::write(path, yaml)
        .map_err(|e| BotError::Internal(format!("Failed to write {}: {}", path, e)))?;
    println!("Wrote default config to {}", path);
    Ok(())
}
