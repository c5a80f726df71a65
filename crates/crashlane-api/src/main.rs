// Crashlane ingestion API server
// Decision: One write endpoint; every collaborator is optional except the two stores
// Decision: Missing geolocation or deobfuscation config degrades with a warning, not a startup failure

mod common;
mod config;
mod sessions;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::get,
    Json, Router,
};
use crashlane_core::{geo::IpInfoClient, retrace::RetraceClient, IngestPipeline};
use crashlane_storage::{
    create_db_group_store, create_db_session_store, ClickHouseSink, Database,
    ObjectStoreAttachments,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ServerConfig;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(sessions::put_session),
    components(schemas(common::AcceptedResponse, common::ErrorResponse)),
    tags(
        (name = "sessions", description = "Session ingestion endpoints")
    ),
    info(
        title = "Crashlane API",
        version = "0.1.0",
        description = "Ingestion API for mobile telemetry sessions",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

/// Wire the pipeline to its stores and optional collaborators
async fn build_pipeline(config: &ServerConfig) -> Result<IngestPipeline> {
    let db = Database::from_url(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    if config.migrate {
        db.migrate().await.context("Failed to run migrations")?;
        tracing::info!("Database migrations applied");
    }

    let sink = ClickHouseSink::new(config.clickhouse.clone());
    tracing::info!(
        url = %config.clickhouse.url,
        database = %config.clickhouse.database,
        "ClickHouse event sink configured"
    );

    let mut pipeline = IngestPipeline::new(
        Arc::new(create_db_session_store(db.clone())),
        Arc::new(sink),
        Arc::new(create_db_group_store(db)),
        config.grouping.clone(),
    );
    tracing::info!(
        max_distance = config.grouping.max_distance,
        scope = ?config.grouping.scope,
        serialize = config.grouping.serialize,
        "Grouping configured"
    );

    match &config.attachments {
        Some(storage) => {
            let store = ObjectStoreAttachments::from_config(storage)
                .context("Failed to create attachment store")?;
            tracing::info!(storage = %storage.storage_type, "Attachment storage configured");
            pipeline = pipeline.with_attachment_store(Arc::new(store));
        }
        None => {
            tracing::warn!("Attachment storage not configured (ATTACHMENTS_STORAGE not set): sessions with attachments will be rejected");
        }
    }

    match IpInfoClient::from_env() {
        Ok(client) => {
            tracing::info!("IP geolocation configured");
            pipeline = pipeline.with_geolocator(Arc::new(client));
        }
        Err(e) => {
            tracing::warn!("IP geolocation not configured: {}. Country codes will be 'not available'.", e);
        }
    }

    match RetraceClient::from_env() {
        Ok(client) => {
            tracing::info!("Symbolication configured");
            pipeline = pipeline.with_deobfuscator(Arc::new(client));
        }
        Err(e) => {
            tracing::warn!("Symbolication not configured: {}. Stack traces are stored as received.", e);
        }
    }

    Ok(pipeline)
}

/// Build the full application router
fn build_app(config: &ServerConfig, sessions_state: sessions::AppState) -> Router {
    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }

    let api_routes = sessions::routes(sessions_state);

    let app = Router::new()
        .route("/health", get(health))
        .merge(build_router_with_prefix(api_routes, &config.api_prefix))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(config.max_body_bytes));

    // Add CORS layer only if origins are configured
    let app = if !config.cors_origins.is_empty() {
        tracing::info!(origins = ?config.cors_origins, "CORS origins configured");
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(config.cors_origins.clone()))
                .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]),
        )
    } else {
        app
    };

    app.layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "crashlane_api=debug,crashlane_core=debug,crashlane_storage=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("crashlane-api starting...");

    let config = ServerConfig::from_env()?;
    let pipeline = build_pipeline(&config).await?;
    let app = build_app(&config, sessions::AppState::new(Arc::new(pipeline)));

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

/// Build router with optional API prefix (extracted for testing)
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
