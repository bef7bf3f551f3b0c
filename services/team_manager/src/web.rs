use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::dashboard;
use crate::deletion::{DeletionFlow, DeletionTarget, EntityKind};
use crate::error::TeamError;
use crate::types::{MatchInput, PlayerInput, PracticeInput};
use crate::Team;

type ApiResult<T> = Result<T, TeamError>;

const LIST_LIMIT: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub team: Team,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: bool,
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "backend": state.team.store.backend_tag(),
    }))
}

#[axum::debug_handler]
async fn dashboard_handler(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(dashboard::dashboard(&state.team, Utc::now()).await?))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.team.metrics.get_metrics())
}

async fn list_players(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let players = state.team.players().get_all().await?;
    Ok(Json(dashboard::player_list(players, Utc::now())))
}

async fn search_players(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let players = state.team.players().search(&params.q).await?;
    Ok(Json(dashboard::player_list(players, Utc::now())))
}

async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.team.players().get(id).await?))
}

async fn player_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        dashboard::player_profile(&state.team, id, Utc::now()).await?,
    ))
}

#[axum::debug_handler]
async fn create_player(
    State(state): State<AppState>,
    Json(input): Json<PlayerInput>,
) -> ApiResult<impl IntoResponse> {
    let player = state.team.players().create(&input).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

async fn update_player(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<PlayerInput>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.team.players().update(id, &input).await?))
}

async fn list_practices(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.team.practices().get_all().await?))
}

async fn search_practices(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.team.practices().search(&params.q).await?))
}

async fn upcoming_practices(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .team
            .practices()
            .upcoming(Utc::now(), LIST_LIMIT)
            .await?,
    ))
}

async fn create_practice(
    State(state): State<AppState>,
    Json(input): Json<PracticeInput>,
) -> ApiResult<impl IntoResponse> {
    let practice = state.team.practices().create(&input).await?;
    Ok((StatusCode::CREATED, Json(practice)))
}

async fn update_practice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<PracticeInput>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.team.practices().update(id, &input).await?))
}

async fn list_matches(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(dashboard::match_list(&state.team).await?))
}

async fn search_matches(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.team.matches().search(&params.q).await?))
}

async fn recent_matches(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.team.matches().recent(LIST_LIMIT).await?))
}

async fn rivals(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.team.matches().rivals().await?))
}

async fn create_match(
    State(state): State<AppState>,
    Json(input): Json<MatchInput>,
) -> ApiResult<impl IntoResponse> {
    let game = state.team.matches().create(&input).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

async fn update_match(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<MatchInput>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.team.matches().update(id, &input).await?))
}

/// `DELETE` without `?confirm=true` stops at the confirmation step.
async fn confirmed_delete(
    team: &Team,
    target: DeletionTarget,
    confirm: bool,
) -> ApiResult<StatusCode> {
    let mut flow = DeletionFlow::new();
    flow.request(target);
    if confirm {
        flow.confirm();
    }
    flow.execute(team).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_player(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let target = DeletionTarget::new(EntityKind::Player, id);
    confirmed_delete(&state.team, target, params.confirm).await
}

async fn delete_practice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let target = DeletionTarget::new(EntityKind::Practice, id);
    confirmed_delete(&state.team, target, params.confirm).await
}

async fn delete_match(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let target = DeletionTarget::new(EntityKind::Match, id);
    confirmed_delete(&state.team, target, params.confirm).await
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/players", get(list_players).post(create_player))
        .route("/api/players/search", get(search_players))
        .route(
            "/api/players/{id}",
            get(get_player).put(update_player).delete(delete_player),
        )
        .route("/api/players/{id}/profile", get(player_profile))
        .route("/api/practices", get(list_practices).post(create_practice))
        .route("/api/practices/search", get(search_practices))
        .route("/api/practices/upcoming", get(upcoming_practices))
        .route(
            "/api/practices/{id}",
            put(update_practice).delete(delete_practice),
        )
        .route("/api/matches", get(list_matches).post(create_match))
        .route("/api/matches/search", get(search_matches))
        .route("/api/matches/recent", get(recent_matches))
        .route("/api/matches/rivals", get(rivals))
        .route(
            "/api/matches/{id}",
            put(update_match).delete(delete_match),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

pub async fn serve(team: Team) -> anyhow::Result<()> {
    let addr = team.config.server.bind_addr.clone();
    let app = router(AppState { team });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API available at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
