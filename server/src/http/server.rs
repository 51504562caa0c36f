use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::auth::require_basic_auth;
use super::handlers;
use super::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/api/entry",
            post(handlers::entry_upsert),
        )
        .route(
            "/api/entry/key",
            get(handlers::entry_get).delete(handlers::entry_delete),
        )
        .route("/api/entry/prefix", get(handlers::entry_list))
        .route("/api/entry/tracking", get(handlers::entry_tracking))
        .route("/api/box", post(handlers::box_upsert).get(handlers::box_list))
        // get() also answers HEAD; the handler switches on the method.
        .route(
            "/api/box/:service/:stage/:template",
            get(handlers::box_retrieve),
        )
        .route(
            "/api/box/:service/:stage/:template/build",
            get(handlers::box_build),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

pub async fn start_server(state: Arc<AppState>, bind_address: SocketAddr) -> Result<()> {
    let app = build_router(state);

    info!("Server listening on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
