use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::EnvFilter;

use anyhow::anyhow;

use waav_dialer::{
    ServerConfig,
    core::platform::{CreateCallRequest, PlatformClient},
    core::realtime::CallMonitor,
    routes,
    state::AppState,
};

/// WaaV Dialer - place and monitor outbound voice-AI calls
#[derive(Parser, Debug)]
#[command(name = "waav-dialer")]
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
    /// Run the dashboard HTTP server
    Serve,

    /// Place an outbound call and stream its events to stdout
    Call {
        #[arg(long)]
        assistant_id: String,
        #[arg(long)]
        phone_number_id: String,
        /// Customer number in E.164 format
        #[arg(long)]
        to: String,
        #[arg(long)]
        customer_name: Option<String>,
    },

    /// Stream events of an existing call to stdout
    Watch {
        /// Platform call id
        call_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Installed before any TLS connection (platform API, realtime channel, server)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!(path = %config_path.display(), "Loading configuration from file");
        ServerConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Call {
            assistant_id,
            phone_number_id,
            to,
            customer_name,
        } => {
            let mut request = CreateCallRequest::new(assistant_id, phone_number_id, to);
            if let Some(name) = customer_name {
                request = request.with_customer_name(name);
            }
            let (client, monitor) = cli_monitor(&config)?;
            let call = client.create_call(&request).await?;
            println!("Call {} created", call.id);
            let events = monitor.subscribe();
            monitor.start(&call).await?;
            stream_to_stdout(&monitor, events).await
        }
        Commands::Watch { call_id } => {
            let (_client, monitor) = cli_monitor(&config)?;
            let events = monitor.subscribe();
            monitor.attach(&call_id).await?;
            stream_to_stdout(&monitor, events).await
        }
    }
}

fn cli_monitor(config: &ServerConfig) -> anyhow::Result<(PlatformClient, CallMonitor)> {
    let platform_config = config.platform_config().map_err(|e| anyhow!(e))?;
    let client = PlatformClient::new(platform_config)?;
    let monitor = CallMonitor::new(Arc::new(client.clone()), config.monitor_config());
    Ok((client, monitor))
}

/// Print log entries as JSON lines until monitoring ends or Ctrl-C.
async fn stream_to_stdout(
    monitor: &CallMonitor,
    mut events: tokio::sync::broadcast::Receiver<waav_dialer::RealtimeMessage>,
) -> anyhow::Result<()> {
    let finished = monitor.finished();
    tokio::pin!(finished);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(message) => println!("{}", serde_json::to_string(&message)?),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Output lagging"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut finished => {
                while let Ok(message) = events.try_recv() {
                    println!("{}", serde_json::to_string(&message)?);
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                let _ = monitor.stop().await;
                break;
            }
        }
    }

    if let Some(session) = monitor.session() {
        println!("{}", serde_json::to_string_pretty(&session)?);
    }
    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let address = config.address();
    let tls_config = config.tls.clone();
    let rate_limit_rps = config.rate_limit_requests_per_second;
    let rate_limit_burst = config.rate_limit_burst_size;
    let cors_origins = config.cors_allowed_origins.clone();
    info!(address = %address, auth_enabled = config.auth_enabled(), "Starting server");

    let app_state = AppState::new(config)?;

    // Rate limiting (disabled when rate >= 100000 for load testing)
    let governor_layer = if rate_limit_rps < 100000 {
        let governor_config = GovernorConfigBuilder::default()
            .per_second(u64::from(rate_limit_rps))
            .burst_size(rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("Failed to build rate limiter config"))?;
        Some(GovernorLayer::new(governor_config))
    } else {
        info!("Rate limiting disabled (rate >= 100000/s)");
        None
    };

    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors_layer = match cors_origins.as_deref() {
        Some("*") => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(false),
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(methods)
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_credentials(true)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            CorsLayer::new()
                .allow_methods(methods)
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_credentials(false)
        }
    };

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
        .layer(cors_layer)
        .layer(tower::util::option_layer(governor_layer))
        .layer(security_headers);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    if let Some(tls) = tls_config {
        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        info!("Server listening on https://{} (TLS enabled)", socket_addr);

        axum_server::bind_rustls(socket_addr, rustls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        info!("Server listening on http://{}", socket_addr);

        let listener = TcpListener::bind(&socket_addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}
