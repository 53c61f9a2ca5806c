use axum::{extract::State, routing::get, Json, Router};

use crate::{
    error::AppResult, ingredients::repo::Ingredient, response::ApiResponse, state::AppState,
};

pub fn ingredient_routes() -> Router<AppState> {
    Router::new().route("/ingredientes", get(list_ingredients))
}

pub async fn list_ingredients(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Ingredient>>>> {
    Ok(Json(ApiResponse::list(Ingredient::find_all(&state.db).await?)))
}
