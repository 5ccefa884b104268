#![allow(dead_code)]
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

mod api;
mod config;
mod db;
mod error;
mod jobs;
mod middleware;
mod utils;

use crate::api::auth::AuthDoc;
use crate::api::jobs::JobDoc;
use crate::config::Config;
use crate::db::queries::documents::DocumentDoc;
use crate::db::queries::requests::RequestDoc;
use crate::db::queries::types::TypeDoc;
use crate::db::queries::users::UserDoc;
use crate::middleware::auth::{auth_context_middleware, create_auth_context_cache, jwt_middleware};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    Config::init();

    std::fs::create_dir_all("logs").expect("Failed to create logs directory");
    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if Config::get().is_development() {
        // Console logging while developing; file logging everywhere else.
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_target(true)
            .with_ansi(false)
            .with_writer(non_blocking)
            .init();
    }

    let pool = db::pool::get_db_pool()
        .await
        .expect("Failed to connect to the database");

    // Standing background jobs (temp cleanup) live in one injected registry.
    let registry = jobs::build_registry(&Config::get()).expect("Failed to register standing jobs");

    let merged_doc = AuthDoc::openapi()
        .merge_from(UserDoc::openapi())
        .merge_from(TypeDoc::openapi())
        .merge_from(RequestDoc::openapi())
        .merge_from(DocumentDoc::openapi())
        .merge_from(JobDoc::openapi());

    let auth_cache = create_auth_context_cache();

    // Public routes
    let public_routes = Router::new().merge(api::auth::auth_routes());

    // Private routes
    let private_routes = Router::new()
        .merge(api::requests::request_routes())
        .merge(api::documents::document_routes())
        .merge(api::users::user_routes())
        .merge(api::types::type_routes())
        .merge(api::jobs::job_routes())
        .route_layer(from_fn_with_state(pool.clone(), auth_context_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", merged_doc).path("/rapidoc"))
        .layer(CorsLayer::permissive())
        .layer(Extension(auth_cache))
        .layer(Extension(registry.clone()))
        .with_state(pool.clone());

    let bind_addr =
        std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {bind_addr}: {e}"));
    tracing::info!(addr = %bind_addr, "secretaria backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    registry.stop_all();
    pool.close().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");
    tracing::info!("Received Ctrl+C, shutting down...");
}
