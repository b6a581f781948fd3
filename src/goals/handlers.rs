use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument};

use super::repo::Goals;
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn goal_routes() -> Router<AppState> {
    Router::new().route("/users/goals", get(get_goals).put(update_goals))
}

#[derive(Debug, Serialize)]
pub struct UpdateGoalsResponse {
    pub message: String,
    pub goals: Goals,
}

#[instrument(skip(state))]
pub async fn get_goals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Goals>, AppError> {
    Ok(Json(state.goals.get_or_create_goals(user_id).await?))
}

#[instrument(skip(state))]
pub async fn update_goals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<Goals>, JsonRejection>,
) -> Result<Json<UpdateGoalsResponse>, AppError> {
    let Json(goals) = payload?;
    state.goals.set_goals(user_id, goals).await?;
    info!(%user_id, "goals updated");
    Ok(Json(UpdateGoalsResponse {
        message: "Goals updated successfully".into(),
        goals,
    }))
}
