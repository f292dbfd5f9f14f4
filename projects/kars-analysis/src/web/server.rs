use crate::pipeline::orchestrator::Analyzer;
use crate::web::{api, serverless};
use anyhow::Result;
use axum::routing::{any, get};
use axum::Router;
use std::net::{IpAddr, SocketAddr, TcpListener};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn router(analyzer: Analyzer) -> Router {
    Router::new()
        .route("/api/analysis", get(api::hello).post(api::analyze_handler))
        .route("/api/serverless/analysis", any(serverless::handler))
        .layer(TraceLayer::new_for_http())
        .with_state(analyzer)
}

pub async fn run_server(host: IpAddr, port: u16, analyzer: Analyzer) -> Result<()> {
    let mut current_port = port;
    let listener = loop {
        let addr = SocketAddr::new(host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
                // Tokio requires a non-blocking socket
                listener.set_nonblocking(true)?;
                info!("Successfully bound to {}", addr);
                break listener;
            }
            Err(e) => {
                warn!("Failed to bind to {}: {}. Trying next port...", addr, e);
                current_port = current_port.wrapping_add(1);
                if current_port == 0 {
                    return Err(anyhow::anyhow!("No available ports found"));
                }
            }
        }
    };

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "Analysis server started on http://{}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, router(analyzer)).await?;

    Ok(())
}
