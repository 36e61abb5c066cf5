use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::catalog::SourceId;
use tokio_util::sync::CancellationToken;

use crate::collect::CollectorRegistry;
use crate::config::LlmConfig;
use crate::error::PipelineError;
use crate::item::CollectedItem;
use crate::pipeline::{Pipeline, RunOptions, RunReport};
use crate::respond::render_chat;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub registry: Arc<CollectorRegistry>,
    pub llm: LlmInfo,
}

/// LLM wiring reported by `/info`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LlmInfo {
    pub llm_provider: String,
    pub routing_model: String,
    pub analysis_model: String,
}

impl From<&LlmConfig> for LlmInfo {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            llm_provider: cfg.provider.clone(),
            routing_model: cfg.model.clone(),
            analysis_model: cfg.synthesis_model().to_string(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/info", get(info))
        .route("/sources", get(list_sources))
        .route("/query", post(run_query))
        .route("/query/{source}", post(run_query_for))
        .route("/collect", post(collect_direct))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct InfoOut {
    status: &'static str,
    #[serde(flatten)]
    llm: LlmInfo,
}

async fn info(State(state): State<AppState>) -> Json<InfoOut> {
    Json(InfoOut {
        status: "ok",
        llm: state.llm.clone(),
    })
}

#[derive(Serialize)]
struct SourceOut {
    id: SourceId,
    fallbacks: Vec<SourceId>,
    has_collector: bool,
}

#[derive(Serialize)]
struct SourcesOut {
    default_source: SourceId,
    max_retries: u32,
    sources: Vec<SourceOut>,
}

async fn list_sources(State(state): State<AppState>) -> Json<SourcesOut> {
    let catalog = state.pipeline.catalog();
    let sources = catalog
        .known()
        .iter()
        .map(|id| SourceOut {
            id: id.clone(),
            fallbacks: catalog.fallbacks_for(id).to_vec(),
            has_collector: state.registry.get(id).is_some(),
        })
        .collect();
    Json(SourcesOut {
        default_source: state.pipeline.router().default_source().clone(),
        max_retries: state.pipeline.settings().max_retries,
        sources,
    })
}

#[derive(Deserialize)]
struct QueryReq {
    query: String,
    #[serde(default)]
    source: Option<String>,
    /// Routing model for this request only.
    #[serde(default)]
    model: Option<String>,
    /// Synthesis model for this request only.
    #[serde(default)]
    analysis_model: Option<String>,
}

#[derive(Serialize)]
struct QueryOut {
    #[serde(flatten)]
    report: RunReport,
    /// Chat-formatted rendering for bot front-ends.
    message: String,
}

#[derive(Serialize)]
struct DegradedOut {
    error: String,
    degraded: QueryOut,
}

async fn run_query(State(state): State<AppState>, Json(body): Json<QueryReq>) -> Response {
    let forced = body.source.as_deref().map(SourceId::new);
    answer_query(&state, body, forced).await
}

/// Path-forced variant: the source must be a registered collector.
async fn run_query_for(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(body): Json<QueryReq>,
) -> Response {
    let source = SourceId::new(&source);
    if state.registry.get(&source).is_none() {
        let available: Vec<&SourceId> = state.registry.ids().collect();
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("unknown source: {source}"),
                "available": available,
            })),
        )
            .into_response();
    }
    answer_query(&state, body, Some(source)).await
}

async fn answer_query(state: &AppState, body: QueryReq, forced: Option<SourceId>) -> Response {
    let options = RunOptions {
        source: forced,
        model: body.model,
        analysis_model: body.analysis_model,
    };

    match state
        .pipeline
        .run_with(&body.query, &options, &CancellationToken::new())
        .await
    {
        Ok(report) => {
            let message = render_chat(&report);
            Json(QueryOut { report, message }).into_response()
        }
        Err(PipelineError::Synthesis { error, degraded }) => {
            let report = *degraded;
            let message = render_chat(&report);
            (
                StatusCode::BAD_GATEWAY,
                Json(DegradedOut {
                    error: error.to_string(),
                    degraded: QueryOut { report, message },
                }),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct CollectReq {
    source: String,
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct CollectOut {
    source: SourceId,
    query: String,
    collected: usize,
    items: Vec<CollectedItem>,
}

/// Single-source fetch without routing or fallback.
async fn collect_direct(State(state): State<AppState>, Json(body): Json<CollectReq>) -> Response {
    let source = SourceId::new(&body.source);
    let limit = body.limit.unwrap_or(state.registry.limit()).clamp(1, 50);

    match state
        .registry
        .fetch_with_limit(&source, &body.query, limit)
        .await
    {
        Ok(items) => Json(CollectOut {
            source,
            query: body.query,
            collected: items.len(),
            items,
        })
        .into_response(),
        Err(e) => {
            let status = match e {
                crate::error::CollectorError::UnknownSource(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}
