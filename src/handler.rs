use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use crate::engine;
use crate::error::AppError;
use crate::schema::{
    CreateMatchSchema, GetMatchSchema, GetTurnSchema, JudgeTurnSchema, MatchDetailSchema,
    RespondSchema, SubmitTurnSchema,
};
use crate::AppState;

/// The verified caller identity, injected by the auth gateway as the
/// `x-caller-id` header. Authorization decisions use only this value, never
/// an id carried in the request body.
pub struct VerifiedCaller(pub Uuid);

#[axum::async_trait]
impl<S> FromRequestParts<S> for VerifiedCaller
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-caller-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .map(VerifiedCaller)
            .ok_or((StatusCode::UNAUTHORIZED, "missing or invalid caller id"))
    }
}

pub async fn create_match_handler(
    State(data): State<Arc<AppState>>,
    VerifiedCaller(caller): VerifiedCaller,
    Json(body): Json<CreateMatchSchema>,
) -> Result<impl IntoResponse, AppError> {
    let m = engine::create_match(&data.db, &data.notifier, caller, body.opponent_id).await?;
    Ok(Json(GetMatchSchema::from(&m)))
}

pub async fn respond_to_match_handler(
    State(data): State<Arc<AppState>>,
    VerifiedCaller(caller): VerifiedCaller,
    Path(match_id): Path<Uuid>,
    Json(body): Json<RespondSchema>,
) -> Result<impl IntoResponse, AppError> {
    let m =
        engine::respond_to_match(&data.db, &data.notifier, match_id, caller, body.accept).await?;
    Ok(Json(GetMatchSchema::from(&m)))
}

pub async fn submit_turn_handler(
    State(data): State<Arc<AppState>>,
    VerifiedCaller(caller): VerifiedCaller,
    Path(match_id): Path<Uuid>,
    Json(body): Json<SubmitTurnSchema>,
) -> Result<impl IntoResponse, AppError> {
    let turn = engine::submit_turn(
        &data.db,
        &data.notifier,
        match_id,
        caller,
        body.media_ref,
        body.thumbnail_ref,
        body.description,
    )
    .await?;
    Ok(Json(GetTurnSchema::from(&turn)))
}

pub async fn judge_turn_handler(
    State(data): State<Arc<AppState>>,
    VerifiedCaller(caller): VerifiedCaller,
    Path(turn_id): Path<Uuid>,
    Json(body): Json<JudgeTurnSchema>,
) -> Result<impl IntoResponse, AppError> {
    let m = engine::judge_turn(&data.db, &data.notifier, turn_id, caller, body.judgment).await?;
    Ok(Json(GetMatchSchema::from(&m)))
}

pub async fn get_match_handler(
    State(data): State<Arc<AppState>>,
    VerifiedCaller(_caller): VerifiedCaller,
    Path(match_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (m, turns) = engine::get_match(&data.db, &data.notifier, match_id).await?;
    Ok(Json(MatchDetailSchema {
        match_: GetMatchSchema::from(&m),
        turns: turns.iter().map(GetTurnSchema::from).collect(),
    }))
}

pub async fn get_my_matches_handler(
    State(data): State<Arc<AppState>>,
    VerifiedCaller(caller): VerifiedCaller,
) -> Result<impl IntoResponse, AppError> {
    let matches = crate::crud::crud_get_matches_for(&data.db, caller).await?;
    let matches: Vec<GetMatchSchema> = matches.iter().map(GetMatchSchema::from).collect();

    let json_response = serde_json::json!({
        "count": matches.len(),
        "matches": matches
    });

    Ok(Json(json_response))
}
