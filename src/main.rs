use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pcbserve::{acl::AddrFilter, routes, AppState, Config, PcbIndex};

#[derive(Parser, Debug)]
#[command(name = "pcbserve")]
#[command(about = "HTTPS viewer for KiCad PCB files with an IP-allowlisted file index")]
#[command(version)]
struct Cli {
    /// Listen address (host:port) for the web UI
    #[arg(short, long, env = "PCBSERVE_LISTEN", default_value = "localhost:8443")]
    listen: String,

    /// Allowed client IPs: comma-separated addresses, CIDR blocks, or
    /// start-end ranges. Omit to allow every client (loopback only).
    #[arg(short, long, env = "PCBSERVE_ALLOWED_IPS")]
    allowed_ips: Option<String>,

    /// Serve KiCad PCBs from this directory and its subdirectories
    #[arg(short = 'p', long, env = "PCBSERVE_PCBS")]
    serve_pcbs: Option<PathBuf>,

    /// Serve the web UI from this directory instead of the bundled assets
    #[arg(short, long, env = "PCBSERVE_WEB_DIR")]
    web_dir: Option<PathBuf>,

    /// Config file path (optional)
    #[arg(short, long, env = "PCBSERVE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, env = "PCBSERVE_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "pcbserve=debug,tower_http=debug"
    } else {
        "pcbserve=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config from file if provided, otherwise use defaults
    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // Parse listen address
    let addr: SocketAddr = cli
        .listen
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| format!("listen address resolves to nothing: {}", cli.listen))?;

    // Parse the client allowlist; no flag means every client is allowed
    let allowlist = match &cli.allowed_ips {
        Some(spec) => AddrFilter::parse(spec)?,
        None => AddrFilter::AllowAll,
    };

    // A non-loopback listen address without an allowlist is refused outright
    pcbserve::acl::check_listen_exposure(addr.ip(), &allowlist)?;

    info!("listen address : {addr}");
    info!("allowed clients: {allowlist}");

    let mut state = AppState::new(allowlist);
    state.config = Arc::new(config);

    if let Some(dir) = &cli.web_dir {
        if !dir.is_dir() {
            return Err(format!("web directory does not exist: {}", dir.display()).into());
        }
        info!("serving web UI from {}", dir.display());
        state = state.with_web_dir(dir.clone());
    } else {
        info!("serving bundled web UI");
    }

    if let Some(dir) = &cli.serve_pcbs {
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.clone());
        if !dir.is_dir() {
            return Err(format!("PCB directory does not exist: {}", dir.display()).into());
        }
        // The initial scan is fatal on any walk error; later refreshes keep
        // the last good snapshot instead.
        let index = PcbIndex::build(dir, &state.config.pcb_suffix)?;
        state = state.with_index(Arc::new(index));
    }

    let tls = RustlsConfig::from_pem_file(&state.config.cert_path, &state.config.key_path)
        .await
        .map_err(|err| format!("failed to load TLS certificate/key: {err}"))?;

    let app = routes::router(state);

    info!("open this link in your browser: https://localhost:{}", addr.port());

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}
