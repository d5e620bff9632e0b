use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use camstream::config::{ConfigStore, SourceKind};
use camstream::state::AppState;
use camstream::utils::{bind_tcp_listener, parse_bind_addr};
use camstream::video::source::open_source;
use camstream::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// camstream command line arguments
#[derive(Parser, Debug)]
#[command(name = "camstream")]
#[command(version, about = "MJPEG-over-HTTP camera streaming server", long_about = None)]
struct CliArgs {
    /// Configuration file (defaults are used if it does not exist)
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        env = "CAMSTREAM_CONFIG",
        default_value = "/etc/camstream/camstream.toml"
    )]
    config: PathBuf,

    /// Listen address (overrides config)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// HTTP port (overrides config)
    #[arg(short = 'p', long, value_name = "PORT")]
    http_port: Option<u16>,

    /// Video device path (overrides config)
    #[arg(short = 'd', long, value_name = "DEVICE")]
    device: Option<String>,

    /// Frame source: v4l2 or test-pattern (overrides config)
    #[arg(short = 's', long, value_name = "SOURCE")]
    source: Option<SourceKind>,

    /// Capture pixel format, e.g. MJPEG, YUYV (overrides config)
    #[arg(short = 'f', long, value_name = "FORMAT")]
    format: Option<String>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting camstream v{}", env!("CARGO_PKG_VERSION"));

    let store = ConfigStore::load(&args.config)
        .await
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    apply_cli_overrides(&store, &args);
    let config = store.get();

    let source = open_source(&config).context("Failed to open frame source")?;
    tracing::info!("Frame source: {}", source.name());

    let state = AppState::new(store.clone(), source);
    let app = web::create_router(state);

    let addr = parse_bind_addr(&config.web.bind_address, config.web.http_port)?;
    let listener = bind_tcp_listener(addr).with_context(|| format!("Failed to bind {}", addr))?;
    let listener = tokio::net::TcpListener::from_std(listener)?;
    tracing::info!("Starting HTTP server on http://{}", listener.local_addr()?);

    let server = axum::serve(listener, app);

    // Streams never end on their own, so shutdown does not wait for them
    tokio::select! {
        _ = shutdown_signal() => {}
        result = async { server.await } => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

fn apply_cli_overrides(store: &ConfigStore, args: &CliArgs) {
    store.update(|config| {
        if let Some(address) = &args.address {
            config.web.bind_address = address.clone();
        }
        if let Some(port) = args.http_port {
            config.web.http_port = port;
        }
        if let Some(device) = &args.device {
            config.video.device = device.clone();
        }
        if let Some(source) = args.source {
            config.video.source = source;
        }
        if let Some(format) = &args.format {
            config.video.format = format.clone();
        }
    });
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "camstream=error,tower_http=error",
        LogLevel::Warn => "camstream=warn,tower_http=warn",
        LogLevel::Info => "camstream=info,tower_http=info",
        LogLevel::Verbose => "camstream=debug,tower_http=info",
        LogLevel::Debug => "camstream=debug,tower_http=debug",
        LogLevel::Trace => "camstream=trace,tower_http=debug",
    };

    // RUST_LOG takes priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
