use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{ResolvedFood, SearchHit, SearchQuery};
use super::services::search_foods;
use crate::{error::AppError, state::AppState};

pub fn food_routes() -> Router<AppState> {
    Router::new()
        .route("/foods/search", get(search))
        .route("/foods/:fdc_id", get(get_food))
}

/// GET /foods/search?food=banana
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let query = q.food.unwrap_or_default();
    let hits = search_foods(state.nutrition.as_ref(), &query, state.lookup_timeout()).await?;
    Ok(Json(hits))
}

/// GET /foods/:fdc_id
#[instrument(skip(state))]
pub async fn get_food(
    State(state): State<AppState>,
    Path(fdc_id): Path<String>,
) -> Result<Json<ResolvedFood>, AppError> {
    let fdc_id = parse_fdc_id(&fdc_id)?;
    Ok(Json(state.resolver.resolve(fdc_id).await?))
}

pub fn parse_fdc_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::Validation("fdcId must be a positive number".into())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::fake::{sample_record, FakeNutritionSource, MemoryStore};

    fn app(source: FakeNutritionSource) -> Router {
        let state = AppState::fake(Arc::new(MemoryStore::default()), Arc::new(source));
        Router::new().merge(food_routes()).with_state(state)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn fdc_id_must_be_positive_integer() {
        assert_eq!(parse_fdc_id("171688").unwrap(), 171688);
        assert!(parse_fdc_id("0").is_err());
        assert!(parse_fdc_id("-3").is_err());
        assert!(parse_fdc_id("apple").is_err());
    }

    #[tokio::test]
    async fn get_food_reports_provenance() {
        let app = app(FakeNutritionSource::with(vec![sample_record(171688, 52.0)]));

        let (status, first) = get_json(app.clone(), "/foods/171688").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["source"], "api");
        assert_eq!(first["data"]["fdc_id"], 171688);

        let (_, second) = get_json(app, "/foods/171688").await;
        assert_eq!(second["source"], "cache");
        assert_eq!(second["data"], first["data"]);
    }

    #[tokio::test]
    async fn unknown_and_invalid_ids() {
        let app = app(FakeNutritionSource::default());
        let (status, body) = get_json(app.clone(), "/foods/12345").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("12345"));

        let (status, _) = get_json(app, "/foods/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_outage_is_503() {
        let (status, _) = get_json(app(FakeNutritionSource::failing()), "/foods/1").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn search_requires_query() {
        let (status, body) = get_json(app(FakeNutritionSource::default()), "/foods/search").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Query parameter is required");
    }

    #[tokio::test]
    async fn search_returns_normalized_hits() {
        let app = app(FakeNutritionSource::with(vec![sample_record(9, 89.0)]));
        let (status, body) = get_json(app, "/foods/search?food=sample").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["fdc_id"], 9);
        assert_eq!(body[0]["nutrients"]["Energy"], 89.0);
        assert_eq!(body[0]["nutrients"].as_object().unwrap().len(), 4);
    }
}
