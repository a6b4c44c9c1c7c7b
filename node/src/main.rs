// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use cosign_node::cluster::Cluster;
use cosign_node::config::NetworkConfig;
use cosign_node::server::build_router;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    cosign_node::telemetry::init_telemetry();

    let cfg = NetworkConfig::from_env();
    tracing::info!("Initializing cosign network with config: {:?}", cfg);

    let cluster = match Cluster::start(&cfg) {
        Ok(cluster) => Arc::new(cluster),
        Err(e) => {
            tracing::error!("Failed to start nodes: {}", e);
            std::process::exit(1);
        }
    };

    let app = build_router(cluster.clone(), cfg.auth_token.clone());

    let addr = cfg.bind_addr;
    tracing::info!("Listening on {}", addr);
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
    cluster.shutdown();
}
