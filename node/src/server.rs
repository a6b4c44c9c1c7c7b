// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::{
    extract::{Path, Request as AxumRequest, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use cosign_kernel::types::RecordId;

use crate::api::*;
use crate::cluster::Cluster;
use crate::errors::FlowError;

pub type SharedCluster = Arc<Cluster>;

async fn auth_guard(
    State(token): State<Arc<String>>,
    req: AxumRequest,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "));

    match provided {
        Some(p) if p == token.as_str() => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

pub fn build_router(state: SharedCluster, auth_token: Option<String>) -> Router {
    let mut app = Router::new()
        .route("/v1/nodes/:name/records", post(start_commit))
        .route("/v1/nodes/:name/records/:id", get(find_record))
        .route("/v1/nodes/:name/records/:id/network", post(find_across_network))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    if let Some(token) = auth_token {
        tracing::info!("Auth Enabled: Bearer token required");
        app = app.layer(from_fn_with_state(Arc::new(token), auth_guard));
    } else {
        tracing::warn!("Auth Disabled: No token configured");
    }

    app
}

fn parse_id(raw: &str) -> Result<RecordId, FlowError> {
    raw.parse()
        .map_err(|_| FlowError::InvalidInput(format!("not a record id: {:?}", raw)))
}

async fn start_commit(
    State(cluster): State<SharedCluster>,
    Path(name): Path<String>,
    Json(req): Json<StartCommitRequest>,
) -> Result<Json<StartCommitResponse>, FlowError> {
    let node = cluster.node(&name)?;
    let counterparty = node.resolve(&req.counterparty)?;
    let id = req.id.unwrap_or_default();

    let outcome = node.start_commit(id, req.payload, counterparty, req.action).await?;
    Ok(Json(StartCommitResponse {
        tx_id: outcome.tx.id().to_string(),
        record_id: id,
        correlation_id: outcome.correlation_id,
    }))
}

async fn find_record(
    State(cluster): State<SharedCluster>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<RecordViewDto>, FlowError> {
    let node = cluster.node(&name)?;
    let view = node.find_record(&parse_id(&id)?)?;
    Ok(Json(RecordViewDto::from(&view)))
}

async fn find_across_network(
    State(cluster): State<SharedCluster>,
    Path((name, id)): Path<(String, String)>,
    Json(req): Json<NetworkQueryRequest>,
) -> Result<Json<NetworkQueryResponse>, FlowError> {
    let node = cluster.node(&name)?;
    let id = parse_id(&id)?;
    let remotes = req
        .parties
        .iter()
        .map(|p| node.resolve(p))
        .collect::<Result<Vec<_>, _>>()?;

    let views = node.find_across_network(id, remotes).await?;
    Ok(Json(NetworkQueryResponse {
        results: views
            .iter()
            .map(|(party, view)| (party.clone(), RecordViewDto::from(view)))
            .collect(),
    }))
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
