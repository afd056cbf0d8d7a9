use std::{path::PathBuf, time::Duration};

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    vidrelay_config::{VidrelayConfig, apply_env_overrides, discover_and_load, load_config},
    vidrelay_fetch::sweep_older_than,
    vidrelay_gateway::start_gateway,
};

#[derive(Parser)]
#[command(name = "vidrelay", about = "Chat-triggered video retrieval relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file path (otherwise vidrelay.{toml,yaml,yml,json} is searched).
    #[arg(long, global = true, env = "VIDRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server (default when no subcommand is provided).
    Serve,
    /// Delete downloaded files older than the given age, then exit.
    Sweep {
        /// Age threshold in seconds.
        #[arg(long, default_value_t = 3600)]
        max_age_secs: u64,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_configuration(config_path: Option<&PathBuf>) -> anyhow::Result<VidrelayConfig> {
    match config_path {
        Some(path) => {
            let mut config = load_config(path)?;
            apply_env_overrides(&mut config);
            Ok(config)
        },
        None => Ok(discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "vidrelay starting");

    let mut config = load_configuration(cli.config.as_ref())?;

    // CLI args override config values.
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match cli.command {
        // Default: serve the webhook when no subcommand is provided.
        None | Some(Commands::Serve) => start_gateway(config).await,
        Some(Commands::Sweep { max_age_secs }) => {
            let removed =
                sweep_older_than(&config.download.dir, Duration::from_secs(max_age_secs)).await?;
            info!(removed, max_age_secs, "sweep finished");
            Ok(())
        },
    }
}
