use axum::{extract::State, routing::get, Json, Router};

use crate::{
    categories::repo::Category, error::AppResult, response::ApiResponse, state::AppState,
};

pub fn category_routes() -> Router<AppState> {
    Router::new().route("/categorias", get(list_categories))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Category>>>> {
    Ok(Json(ApiResponse::list(Category::find_all(&state.db).await?)))
}
