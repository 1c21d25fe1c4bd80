use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sports_odds_engine::config::EngineConfig;
use sports_odds_engine::orchestrator::ResolutionSource;
use sports_odds_engine::OddsEngine;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type AppState = Arc<OddsEngine>;

/// JSON error body with a status code
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

fn bad_request(err: anyhow::Error) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, err.to_string())
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn odds(
    State(engine): State<AppState>,
    Path(sport): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let resolution = engine.resolve(&sport, query.date.as_deref()).await;
    if resolution.source == ResolutionSource::Rejected {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            format!("Unknown sport or invalid date: {}", sport),
        ));
    }
    Ok(Json(resolution).into_response())
}

async fn freshness(
    State(engine): State<AppState>,
    Path(sport): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let freshness = engine
        .freshness(&sport, query.date.as_deref())
        .await
        .map_err(bad_request)?;
    Ok(Json(freshness).into_response())
}

async fn stats(State(engine): State<AppState>) -> Result<Response, ApiError> {
    let stats = engine
        .stats()
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(stats).into_response())
}

async fn sync_all(
    State(engine): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let results = engine
        .sync_all_sports(query.date.as_deref())
        .await
        .map_err(bad_request)?;
    Ok(Json(results).into_response())
}

async fn sync_startup(State(engine): State<AppState>) -> impl IntoResponse {
    Json(engine.startup_sync().await)
}

fn app(engine: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/odds/:sport", get(odds))
        .route("/odds/:sport/freshness", get(freshness))
        .route("/stats", get(stats))
        .route("/sync", post(sync_all))
        .route("/sync/startup", post(sync_startup))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = EngineConfig::from_env()?;
    let addr = config.web_addr.clone();
    let sync_interval = config.sync_interval;
    let engine = Arc::new(OddsEngine::from_config(config).await?);

    // Bring stale sports up to date without holding up the listener
    let startup = engine.clone();
    tokio::spawn(async move {
        let report = startup.startup_sync().await;
        info!(
            synced = report.synced.len(),
            skipped = report.skipped.len(),
            "Startup sync finished"
        );
    });

    if let Some(interval) = sync_interval {
        info!(minutes = interval.as_secs() / 60, "Scheduling periodic odds sync");
        tokio::spawn(engine.scheduler().run_periodic(interval));
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Odds service listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app(engine)).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use sports_odds_engine::cache::OddsCacheStore;
    use sports_odds_engine::config::SettingsCache;
    use sports_odds_engine::plugins::PluginRegistry;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let config = EngineConfig {
            tracked_sports: vec![sports_odds_engine::Sport::Nhl],
            sync_delay: Duration::ZERO,
            startup_sync_delay: Duration::ZERO,
            ..EngineConfig::default()
        };
        let settings = Arc::new(SettingsCache::with_lookup(Duration::from_secs(60), |_| None));
        let store = OddsCacheStore::in_memory(config.stale_after()).await.unwrap();
        let engine = OddsEngine::with_parts(config, settings, PluginRegistry::new(), store);
        app(Arc::new(engine))
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(test_app().await, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_odds_with_no_providers_is_empty() {
        let (status, body) = send(test_app().await, "GET", "/odds/nhl?date=2025-02-14").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"]["kind"], "exhausted");
        assert_eq!(body["games"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_sport_is_bad_request() {
        let (status, body) = send(test_app().await, "GET", "/odds/curling").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("curling"));
    }

    #[tokio::test]
    async fn test_freshness_and_stats() {
        let app = test_app().await;

        let (status, body) = send(app.clone(), "GET", "/odds/nhl/freshness?date=2025-02-14").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_stale"], true);
        assert_eq!(body["cached_games"], 0);

        let (status, body) = send(app, "GET", "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_games"], 0);
    }

    #[tokio::test]
    async fn test_sync_routes() {
        let app = test_app().await;

        let (status, body) = send(app.clone(), "POST", "/sync?date=2025-02-14").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["sport"], "nhl");
        assert_eq!(body[0]["games_inserted"], 0);

        let (status, _) = send(app.clone(), "POST", "/sync?date=tomorrow").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(app, "POST", "/sync/startup").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["synced"][0], "nhl");
    }
}
