//! ABL partida HTTP service entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use abl_partida::{
    ChromiumRenderer, LaunchOptions, NotificationComposer, PageFetcher, RecordResolver, Renderer,
};
use abl_partida_server::config::AppConfig;
use abl_partida_server::mail::SmtpMailer;
use abl_partida_server::rest::{self, AppState};

#[derive(Parser)]
#[command(
    name = "abl-partida-server",
    about = "HTTP service answering ABL tax-record lookups, by JSON response or by email",
    version
)]
struct Cli {
    /// Listen port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Load environment from this file instead of ./.env.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines. LOG_JSON accepts 1/0, true/false, yes/no, on/off.
    #[arg(long, env = "LOG_JSON", value_parser = clap::builder::BoolishValueParser::new())]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_loaded = match &cli.env_file {
        Some(path) => dotenvy::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))
            .map(|_| true)?,
        None => dotenvy::dotenv().is_ok(),
    };

    init_tracing(&cli.log_level, cli.log_json);
    if env_loaded {
        info!("loaded environment file");
    }

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let mailer = SmtpMailer::new(&config.smtp).context("invalid SMTP configuration")?;

    let renderer = match ChromiumRenderer::start(LaunchOptions {
        chrome_path: config.chrome_path.clone(),
    })
    .await
    {
        Ok(renderer) => Arc::new(renderer),
        Err(e) => {
            error!("Error starting Chromium: {e}");
            std::process::exit(1);
        }
    };

    let session: Arc<dyn Renderer> = renderer.clone();
    let mut fetcher = PageFetcher::new(Arc::clone(&session))
        .with_navigation_timeout(config.navigation_timeout);
    match config.max_open_pages {
        Some(max) => {
            info!(max, "page contexts capped");
            fetcher = fetcher.with_max_open_pages(max);
        }
        None => warn!("no cap on concurrently open page contexts (set MAX_OPEN_PAGES to add one)"),
    }

    let state = Arc::new(AppState::new(
        session,
        RecordResolver::new(fetcher, config.base_url.clone()),
        NotificationComposer::new(config.branding.clone()),
        Arc::new(mailer),
    ));
    let app = rest::router(state, config.request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let served = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => rest::serve(listener, app, shutdown_signal())
            .await
            .context("server error"),
        Err(e) => Err(anyhow::Error::new(e).context(format!("failed to bind {addr}"))),
    };

    info!("Shutting down server...");
    if let Err(e) = renderer.shutdown().await {
        warn!("error closing Chromium: {e}");
    }

    served
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("received shutdown signal");
}
