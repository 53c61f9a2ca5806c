use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use tracing::instrument;

use crate::{
    auth::{claims::Identity, extractors::WebUser},
    categories::repo::Category,
    error::{AppError, WebError},
    recipes::{
        dto::SearchParams,
        repo_types::{Difficulty, Recipe, RecipeFilter},
    },
    state::AppState,
    web::templates::{
        render, CategoryTemplate, IndexTemplate, RecipeTemplate, SearchTemplate, SelectOption,
    },
};

pub fn frontoffice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/receita/:id", get(recipe_page))
        .route("/categoria/:id", get(category_page))
        .route("/pesquisa", get(search_page))
}

fn identity(visitor: Option<WebUser>) -> Option<Identity> {
    visitor.map(|WebUser(who)| who)
}

#[instrument(skip(state, visitor))]
pub async fn index(
    State(state): State<AppState>,
    visitor: Option<WebUser>,
) -> Result<Response, WebError> {
    let recipes = Recipe::find_all(&state.db).await?;
    let categories = Category::find_all(&state.db).await?;
    render(IndexTemplate {
        title: "Início",
        user: identity(visitor),
        recipes,
        categories,
    })
}

#[instrument(skip(state, visitor))]
pub async fn recipe_page(
    State(state): State<AppState>,
    visitor: Option<WebUser>,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let recipe = Recipe::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("Receita não encontrada"))?;
    let ingredients = Recipe::ingredients(&state.db, id).await?;
    render(RecipeTemplate {
        title: recipe.name.clone(),
        user: identity(visitor),
        recipe,
        ingredients,
    })
}

#[instrument(skip(state, visitor))]
pub async fn category_page(
    State(state): State<AppState>,
    visitor: Option<WebUser>,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let category = Category::find_by_id(&state.db, id)
        .await?
        .ok_or(AppError::NotFound("Categoria não encontrada"))?;
    let recipes = Recipe::find_by_category(&state.db, id).await?;
    render(CategoryTemplate {
        title: category.name.clone(),
        user: identity(visitor),
        category,
        recipes,
    })
}

#[instrument(skip(state, visitor))]
pub async fn search_page(
    State(state): State<AppState>,
    visitor: Option<WebUser>,
    Query(params): Query<SearchParams>,
) -> Result<Response, WebError> {
    let (filter, error) = match params.to_filter() {
        Ok(filter) => (filter, None),
        Err(AppError::Validation(msg)) => (RecipeFilter::default(), Some(msg)),
        Err(e) => return Err(e.into()),
    };

    let recipes = if error.is_some() {
        Vec::new()
    } else {
        Recipe::search(&state.db, &filter).await?
    };
    let categories = Category::find_all(&state.db).await?;
    let difficulties = Difficulty::find_all(&state.db).await?;

    render(SearchTemplate {
        title: "Pesquisa",
        user: identity(visitor),
        termo: params.termo.unwrap_or_default(),
        categories: SelectOption::build(&categories, filter.category_id, |c| (c.id, c.name.clone())),
        difficulties: SelectOption::build(&difficulties, filter.difficulty_id, |d| {
            (d.id, d.level.clone())
        }),
        recipes,
        error,
    })
}
