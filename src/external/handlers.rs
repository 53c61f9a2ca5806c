use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    external::client::ExternalMeal,
    response::ApiResponse,
    state::AppState,
};

pub fn external_routes() -> Router<AppState> {
    Router::new()
        .route("/external/random", get(random_meal))
        .route("/external/search/:term", get(search_meals))
}

#[instrument(skip(state))]
pub async fn random_meal(State(state): State<AppState>) -> AppResult<Json<ApiResponse<ExternalMeal>>> {
    let meal = state
        .meal_db
        .random()
        .await?
        .ok_or(AppError::NotFound("Nenhuma receita externa encontrada"))?;
    Ok(Json(ApiResponse::ok(meal)))
}

#[instrument(skip(state))]
pub async fn search_meals(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<ExternalMeal>>>> {
    let meals = state.meal_db.search(&term).await?;
    Ok(Json(ApiResponse::list(meals)))
}
