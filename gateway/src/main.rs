use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use http::{Method, header::CONTENT_TYPE};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use live_gateway::{
    ClientConfig, ClientNotice, LiveClient, ServerConfig,
    client::{LogSynthesizer, NullSink},
    routes,
    state::AppState,
};

/// Live Gateway - text and voice sessions for a conversational agent
#[derive(Parser, Debug)]
#[command(name = "live-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway server
    Serve,

    /// Connect to a gateway and send each stdin line as a typed message
    Client {
        /// Gateway WebSocket URL, overriding configuration
        #[arg(short = 'u', long = "url")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cli.config).await,
        Commands::Client { url } => run_client(cli.config, url).await,
    }
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE])
            .allow_credentials(false),
        Some(origins) => {
            // Parse comma-separated origins
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(true)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            // No allow_origin = same-origin only
            CorsLayer::new()
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(false)
        }
    }
}

async fn serve(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    // Load configuration from file or environment
    let config = if let Some(config_path) = config_path {
        println!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(&config_path)?
    } else {
        ServerConfig::from_env()?
    };

    let address = config.address();
    let cors_origins = config.cors_allowed_origins.clone();
    println!("Starting server on {address}");

    let app_state = AppState::new(config)?;

    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    let app = routes::create_app(app_state)
        .layer(cors_layer(cors_origins.as_deref()))
        .layer(security_headers);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    println!("Server listening on http://{}", socket_addr);
    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_client(config_path: Option<PathBuf>, url: Option<String>) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => ClientConfig::from_file(&path)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(url) = url {
        config.url = url;
        config.validate()?;
    }

    let (client, mut notices) = LiveClient::spawn(
        config,
        Arc::new(NullSink),
        Arc::new(LogSynthesizer::default()),
    )?;
    client.connect()?;

    let notice_task = tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            match notice {
                ClientNotice::AgentResponse { text, .. } => println!("agent> {}", text),
                ClientNotice::Activity { view } => {
                    info!(request_id = %view.request_id, "{}", view.message)
                }
                ClientNotice::TextRejected { reason } => warn!(?reason, "Message not sent"),
                ClientNotice::GatewayError { message } => warn!("Gateway error: {}", message),
                ClientNotice::Disconnected { reason } => {
                    info!(?reason, "Disconnected");
                    break;
                }
                ClientNotice::AudioLevel { .. } => {}
                other => info!(notice = ?other, "Client event"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if notice_task.is_finished() {
            break;
        }
        client.send_text(line)?;
    }

    client.disconnect()?;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), notice_task).await;
    client.shutdown()?;
    Ok(())
}
