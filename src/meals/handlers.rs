use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    DailyView, DeleteFoodResponse, DeleteMealResponse, LogFoodRequest, LogFoodResponse, MealView,
};
use super::services;
use crate::{auth::AuthUser, error::AppError, foods::handlers::parse_fdc_id, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals/:date", get(get_meals_by_date))
        .route("/meals/meal/:id", get(get_meal))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals/log-food", post(log_food))
        .route("/meals/delete-food/:meal_id/:fdc_id", delete(delete_food))
        .route("/meals/delete-meal/:meal_id", delete(delete_meal))
}

/// GET /meals/:date (YYYY-MM-DD)
#[instrument(skip(state))]
pub async fn get_meals_by_date(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
) -> Result<Json<DailyView>, AppError> {
    let date = services::parse_date(&date)?;
    let view = services::compute_daily_view(state.meals.as_ref(), user_id, date).await?;
    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<MealView>, AppError> {
    let Path(id) = id?;
    Ok(Json(services::get_meal(state.meals.as_ref(), user_id, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn log_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<LogFoodRequest>, JsonRejection>,
) -> Result<Json<LogFoodResponse>, AppError> {
    let Json(body) = payload?;
    let (food, quantity) = services::log_food(
        state.meals.as_ref(),
        &state.resolver,
        user_id,
        body.meal_id,
        body.fdc_id,
        body.quantity,
    )
    .await?;

    Ok(Json(LogFoodResponse {
        message: "Food logged successfully!".into(),
        food,
        quantity,
    }))
}

#[instrument(skip(state))]
pub async fn delete_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    params: Result<Path<(Uuid, String)>, PathRejection>,
) -> Result<Json<DeleteFoodResponse>, AppError> {
    let Path((meal_id, fdc_id)) = params?;
    let fdc_id = parse_fdc_id(&fdc_id)?;
    services::delete_food(state.meals.as_ref(), user_id, meal_id, fdc_id).await?;
    Ok(Json(DeleteFoodResponse {
        message: format!("Food with ID {fdc_id} deleted successfully from meal {meal_id}"),
        deleted_food_id: fdc_id,
    }))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    meal_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeleteMealResponse>, AppError> {
    let Path(meal_id) = meal_id?;
    let shell = services::delete_meal(state.meals.as_ref(), user_id, meal_id).await?;
    Ok(Json(DeleteMealResponse {
        message: format!("Meal {meal_id} was deleted"),
        deleted_meal_type: shell.meal_type,
        deleted_meal_date: shell.date,
    }))
}
