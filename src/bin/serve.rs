use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use scholar_search::query::{QueryMode, RankWeights};
use scholar_search::Engine;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

const RATE_LIMIT_WINDOW_SECS: u64 = 10;
const RATE_LIMIT_MAX_REQUESTS: u32 = 30;

struct RateLimiter {
    buckets: Mutex<HashMap<String, (u32, Instant)>>,
}

impl RateLimiter {
    fn new() -> Self {
        RateLimiter { buckets: Mutex::new(HashMap::new()) }
    }

    fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let window = Duration::from_secs(RATE_LIMIT_WINDOW_SECS);
        let now = Instant::now();

        let entry = buckets.entry(key.to_string()).or_insert((0, now));
        if now.duration_since(entry.1) >= window {
            *entry = (1, now);
            return true;
        }
        if entry.0 < RATE_LIMIT_MAX_REQUESTS {
            entry.0 += 1;
            return true;
        }
        false
    }
}

struct AppState {
    engine: Engine,
    rate_limiter: RateLimiter,
}

type SharedState = Arc<AppState>;

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    semantic: Option<bool>,
}

#[derive(Deserialize)]
struct AutocompleteQuery {
    q: String,
}

#[derive(Deserialize)]
struct SimilarQuery {
    word: String,
}

#[derive(Deserialize)]
struct IndexRequest {
    doc_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    r#abstract: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    authors: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn sanitize_query(q: &str) -> Option<String> {
    let trimmed = q.trim();
    if trimmed.is_empty() || trimmed.len() > 256 {
        return None;
    }
    Some(trimmed.to_string())
}

async fn search_api(State(state): State<SharedState>, Query(params): Query<SearchQuery>) -> impl IntoResponse {
    if !state.rate_limiter.check("global") {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse { error: "rate limit exceeded".into() }),
        )
            .into_response();
    }

    let q = match sanitize_query(&params.q) {
        Some(q) => q,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: "invalid query".into() }),
            )
                .into_response()
        }
    };

    let mode = match params.mode.as_deref() {
        Some("and") => QueryMode::And,
        _ => QueryMode::Or,
    };
    let top_k = params.limit.unwrap_or(scholar_search::constants::DEFAULT_TOP_K);
    let semantic = params.semantic.unwrap_or(true);

    match state.engine.search(&q, mode, RankWeights::default(), top_k, semantic) {
        Ok(hits) => Json(hits).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "search failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() })).into_response()
        }
    }
}

async fn autocomplete_api(
    State(state): State<SharedState>,
    Query(params): Query<AutocompleteQuery>,
) -> impl IntoResponse {
    if !state.rate_limiter.check("global") {
        return (StatusCode::TOO_MANY_REQUESTS, Json(ErrorResponse { error: "rate limit exceeded".into() }))
            .into_response();
    }
    let (words, phrases) = state.engine.autocomplete(&params.q);
    Json(serde_json::json!({ "words": words, "phrases": phrases })).into_response()
}

async fn similar_api(State(state): State<SharedState>, Query(params): Query<SimilarQuery>) -> impl IntoResponse {
    if !state.rate_limiter.check("global") {
        return (StatusCode::TOO_MANY_REQUESTS, Json(ErrorResponse { error: "rate limit exceeded".into() }))
            .into_response();
    }
    let neighbors = state.engine.similar(&params.word);
    Json(neighbors).into_response()
}

async fn index_api(State(state): State<SharedState>, Json(req): Json<IndexRequest>) -> impl IntoResponse {
    if !state.rate_limiter.check("global") {
        return (StatusCode::TOO_MANY_REQUESTS, Json(ErrorResponse { error: "rate limit exceeded".into() }))
            .into_response();
    }

    match state
        .engine
        .index_document(req.doc_id, &req.title, &req.r#abstract, &req.body, req.authors)
        .await
    {
        Ok(stats) => Json(serde_json::json!({
            "doc_id": stats.doc_id,
            "total_terms": stats.total_terms,
            "unique_terms": stats.unique_terms,
            "new_terms_added": stats.new_terms_added,
            "indexing_time_ms": stats.indexing_time_ms,
        }))
        .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e.to_string() })).into_response(),
    }
}

/// Run the search engine's HTTP surface over a data directory built by
/// `bulk-index` (and, optionally, incrementally added to at runtime via
/// `/api/index`).
#[derive(Parser, Debug)]
#[command(name = "serve")]
struct Args {
    /// Data directory containing indexes/, barrels/, config.json, etc.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let engine = Engine::open(args.data_dir).map_err(|e| anyhow::anyhow!("failed to open engine: {e}"))?;
    let state = Arc::new(AppState { engine, rate_limiter: RateLimiter::new() });

    let app = Router::new()
        .route("/api/search", get(search_api))
        .route("/api/autocomplete", get(autocomplete_api))
        .route("/api/similar", get(similar_api))
        .route("/api/index", post(index_api))
        .with_state(state);

    let listener = TcpListener::bind(&args.listen).await?;
    tracing::info!(addr = %args.listen, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
