use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{claims::Identity, extractors::AuthUser},
    error::{AppError, AppResult},
    recipes::{
        dto::{CreatedRecipe, RecipeDetails, SearchParams},
        repo_types::{Difficulty, Recipe, RecipeInput},
        services,
    },
    response::ApiResponse,
    state::AppState,
};

const NOT_FOUND: &str = "Receita não encontrada";

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/receitas", get(list_recipes).post(create_recipe))
        .route(
            "/receitas/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/dificuldades", get(list_difficulties))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<ApiResponse<Vec<Recipe>>>> {
    let filter = params.to_filter()?;
    let recipes = if filter.is_empty() {
        Recipe::find_all(&state.db).await?
    } else {
        Recipe::search(&state.db, &filter).await?
    };
    Ok(Json(ApiResponse::list(recipes)))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<RecipeDetails>>> {
    let recipe = Recipe::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound(NOT_FOUND))?;
    let ingredients = Recipe::ingredients(&state.db, id).await?;
    Ok(Json(ApiResponse::ok(RecipeDetails { recipe, ingredients })))
}

#[instrument(skip(state, who, payload), fields(user_id = who.id))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Json(payload): Json<RecipeInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedRecipe>>)> {
    let input = services::validate(payload)?;
    let id = Recipe::create(&state.db, &input, who.id).await?;
    info!(recipe_id = id, "recipe created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(CreatedRecipe { id }).with_message("Receita criada com sucesso")),
    ))
}

/// Loads the recipe and checks that the caller may change it.
async fn owned_recipe(state: &AppState, who: &Identity, id: i64) -> AppResult<Recipe> {
    let recipe = Recipe::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound(NOT_FOUND))?;
    if !who.can_modify(recipe.user_id) {
        warn!(user_id = who.id, recipe_id = id, "not the recipe owner");
        return Err(AppError::Forbidden);
    }
    Ok(recipe)
}

#[instrument(skip(state, who, payload), fields(user_id = who.id))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<RecipeInput>,
) -> AppResult<Json<ApiResponse<()>>> {
    let current = owned_recipe(&state, &who, id).await?;
    let input = services::validate(payload)?;

    if !Recipe::update(&state.db, id, &input).await? {
        return Err(AppError::NotFound(NOT_FOUND));
    }
    if input.image.is_some() && input.image != current.image {
        services::release_image(&state.db, state.storage.as_ref(), id, current.image.as_deref()).await;
    }
    info!(recipe_id = id, "recipe updated");
    Ok(Json(ApiResponse::message("Receita atualizada com sucesso")))
}

#[instrument(skip(state, who), fields(user_id = who.id))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    let current = owned_recipe(&state, &who, id).await?;
    if !Recipe::delete(&state.db, id).await? {
        return Err(AppError::NotFound(NOT_FOUND));
    }
    services::release_image(&state.db, state.storage.as_ref(), id, current.image.as_deref()).await;
    info!(recipe_id = id, "recipe deleted");
    Ok(Json(ApiResponse::message("Receita eliminada com sucesso")))
}

pub async fn list_difficulties(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Difficulty>>>> {
    Ok(Json(ApiResponse::list(Difficulty::find_all(&state.db).await?)))
}
