use std::sync::Arc;

use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{Instrument, Level};
use uuid::Uuid;

use crate::config::Settings;
use crate::handler::{
    create_competition_handler, create_match_handler, create_team_handler,
    delete_competition_handler, delete_match_handler, delete_team_handler,
    get_competition_handler, get_competitions_handler, get_match_by_external_id_handler,
    get_match_by_id_handler, get_matches_handler, get_team_handler, get_team_matches_handler,
    get_team_stats_handler, get_teams_handler, health_handler, root_handler, update_match_handler,
};
use crate::AppState;

pub const CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// Tags each request with a correlation id, reusing the caller's when it sent one.
async fn correlation_id(req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(&CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        correlation_id = %id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut res = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(CORRELATION_ID, value);
    }
    res
}

fn cors(settings: &Settings) -> CorsLayer {
    let origins = if settings.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            settings
                .allowed_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    let mut headers = vec![CONTENT_TYPE];
    if let Ok(api_key) = HeaderName::from_bytes(settings.api_key_header.as_bytes()) {
        headers.push(api_key);
    }

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_origin(origins)
        .allow_headers(AllowHeaders::list(headers))
        .expose_headers([CORRELATION_ID])
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/competitions",
            get(get_competitions_handler).post(create_competition_handler),
        )
        .route(
            "/competitions/:competition_id",
            get(get_competition_handler).delete(delete_competition_handler),
        )
        .route("/teams", get(get_teams_handler).post(create_team_handler))
        .route(
            "/teams/:team_id",
            get(get_team_handler).delete(delete_team_handler),
        )
        .route("/teams/:team_id/matches", get(get_team_matches_handler))
        .route("/stats/team/:team_id", get(get_team_stats_handler))
        .route(
            "/matches",
            get(get_matches_handler).post(create_match_handler),
        )
        .route(
            "/matches/external/:external_id",
            get(get_match_by_external_id_handler),
        )
        .route(
            "/matches/:match_id",
            get(get_match_by_id_handler)
                .patch(update_match_handler)
                .delete(delete_match_handler),
        )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .nest(&state.settings.api_prefix(), api_routes())
        .layer(cors(&state.settings))
        .layer(trace_layer)
        .layer(middleware::from_fn(correlation_id))
        .with_state(state)
}
