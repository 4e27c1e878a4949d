//! Realtime console gateway.
//!
//! Resolves layered configuration, builds the Twilio client when it is
//! configured, keeps the backend tool list fresh in the background, and
//! serves status, config, phone number, and tool routes over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use common::config::{ConfigFile, ConfigLayers, EnvSource, PublicConfig, ServerConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tools::{HttpToolFetcher, ToolPoller};
use tower_http::trace::TraceLayer;
use tracing::info;

mod routes;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,
    #[arg(long, default_value_t = 3000)]
    port: u16,
    /// Build-time config (JSON with `server` and `public` sections)
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Runtime config, same shape as the build-time file
    #[arg(long)]
    runtime_config: Option<PathBuf>,
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
    /// Tool list URL. Defaults to `<WEBSOCKET_SERVER_URL>/tools`; empty disables polling.
    #[arg(long)]
    tools_url: Option<String>,
    #[arg(long, default_value_t = 3000)]
    tools_interval_ms: u64,
    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gateway=info,tools=info,twilio=info,common=info,tower_http=info".into());
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_layers(args: &Args) -> Result<ConfigLayers> {
    let env = EnvSource::capture_with_env_file(&args.env_file)
        .context("Failed to load env file")?;
    let build_time = ConfigFile::load(&args.config).context("Failed to load build-time config")?;
    let runtime = match &args.runtime_config {
        Some(path) => ConfigFile::load(path).context("Failed to load runtime config")?,
        None => ConfigFile::default(),
    };
    Ok(ConfigLayers {
        build_time,
        runtime,
        env,
    })
}

/// `<server>/tools`, or empty (polling disabled) when no server is configured.
fn backend_tools_url(websocket_server_url: &str) -> String {
    let base = websocket_server_url.trim_end_matches('/');
    if base.is_empty() {
        return String::new();
    }
    format!("{}/tools", base)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    info!("Realtime console gateway v{}", env!("CARGO_PKG_VERSION"));

    let layers = load_layers(&args)?;
    let server = ServerConfig::resolve(&layers.server_resolver());
    let public = PublicConfig::resolve(&layers.public_resolver());
    info!(
        websocket_server_url = %server.websocket_server_url,
        public_websocket_url = %public.websocket_url(),
        credentials_set = server.has_twilio_credentials(),
        twilio_enabled = server.enable_twilio,
        "Configuration resolved"
    );

    // Constructed once; absent when unconfigured or disabled.
    let twilio = twilio::init(&server);

    let http = reqwest::Client::builder()
        .user_agent(concat!("gateway/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let poller = Arc::new(ToolPoller::new(Arc::new(HttpToolFetcher::with_client(http))));
    let tools_url = args
        .tools_url
        .clone()
        .unwrap_or_else(|| backend_tools_url(&server.websocket_server_url));
    poller
        .start(&tools_url, args.tools_interval_ms)
        .context("Failed to start tool poller")?;

    let state = routes::AppState::new(server, public, twilio, Arc::clone(&poller));
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(args.host, args.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Gateway listening on {}", addr);
    info!("Config loaded from: {}", args.config.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    poller.stop();
    Ok(())
}
