use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use crate::{
    auth::{claims::Identity, extractors::WebAdmin, repo_types::User},
    categories::repo::{Category, CategoryInput},
    error::{AppError, AppResult, WebError},
    images::services::{discard_image, multipart_error, store_recipe_image, UploadItem},
    ingredients::repo::{Ingredient, IngredientInput},
    recipes::{
        repo_types::{Difficulty, Recipe, RecipeIngredient, RecipeInput},
        services::{parse_ingredients_field, release_image, validate},
    },
    state::AppState,
    web::templates::{
        render, CategoriesAdminTemplate, DashboardStats, DashboardTemplate,
        IngredientsAdminTemplate, RecipeFormTemplate, RecipeFormValues, RecipesAdminTemplate,
        SelectOption, UsersAdminTemplate,
    },
};

const RECENT_RECIPES: i64 = 5;

pub fn backoffice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/receitas", get(recipes_list))
        .route("/receitas/nova", get(recipe_new_page).post(recipe_create))
        .route("/receitas/editar/:id", get(recipe_edit_page).post(recipe_update))
        .route("/receitas/eliminar/:id", post(recipe_delete))
        .route("/categorias", get(categories_list))
        .route("/categorias/nova", post(category_create))
        .route("/categorias/editar/:id", get(category_edit_page).post(category_update))
        .route("/categorias/eliminar/:id", post(category_delete))
        .route("/ingredientes", get(ingredients_list))
        .route("/ingredientes/novo", post(ingredient_create))
        .route("/ingredientes/editar/:id", get(ingredient_edit_page).post(ingredient_update))
        .route("/ingredientes/eliminar/:id", post(ingredient_delete))
        .route("/utilizadores", get(users_list))
        .route("/utilizadores/eliminar/:id", post(user_delete))
}

/// Outcome codes carried across the post/redirect/get cycle.
#[derive(Debug, Default, Deserialize)]
pub struct Notice {
    pub ok: Option<String>,
    pub erro: Option<String>,
}

impl Notice {
    fn text(code: &str) -> Option<String> {
        let msg = match code {
            "criada" => "Criado com sucesso",
            "atualizada" => "Atualizado com sucesso",
            "eliminada" => "Eliminado com sucesso",
            "em-uso" => "Não é possível eliminar: existem receitas associadas",
            "duplicado" => "Já existe um registo com esse nome",
            "invalido" => "Preencha os campos obrigatórios",
            "proprio" => "Não pode eliminar a sua própria conta",
            "inexistente" => "Registo não encontrado",
            _ => return None,
        };
        Some(msg.to_string())
    }

    fn notice(&self) -> Option<String> {
        self.ok.as_deref().and_then(Self::text)
    }

    fn error(&self) -> Option<String> {
        self.erro.as_deref().and_then(Self::text)
    }
}

fn back(path: &str, key: &str, code: &str) -> Response {
    Redirect::to(&format!("/backoffice/{}?{}={}", path, key, code)).into_response()
}

/// Maps constraint violations to a notice code; other errors propagate.
fn constraint_code(e: sqlx::Error) -> Result<&'static str, WebError> {
    match e.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => Ok("em-uso"),
        Some(db) if db.is_unique_violation() => Ok("duplicado"),
        _ => Err(e.into()),
    }
}

pub async fn stats(db: &PgPool) -> sqlx::Result<DashboardStats> {
    let (recipes, users, categories, ingredients) = tokio::try_join!(
        Recipe::count(db),
        User::count(db),
        Category::count(db),
        Ingredient::count(db),
    )?;
    Ok(DashboardStats { recipes, users, categories, ingredients })
}

#[instrument(skip(state, admin))]
pub async fn dashboard(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
) -> Result<Response, WebError> {
    render(DashboardTemplate {
        title: "Backoffice",
        user: Some(admin),
        stats: stats(&state.db).await?,
        recent: Recipe::recent(&state.db, RECENT_RECIPES).await?,
    })
}

// --- recipes ---

#[instrument(skip(state, admin))]
pub async fn recipes_list(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    Query(notice): Query<Notice>,
) -> Result<Response, WebError> {
    render(RecipesAdminTemplate {
        title: "Receitas",
        user: Some(admin),
        recipes: Recipe::find_all(&state.db).await?,
        notice: notice.notice(),
        error: notice.error(),
    })
}

/// Text fields plus the optional `imagem` file of the recipe form.
struct RecipeForm {
    fields: HashMap<String, String>,
    image: Option<UploadItem>,
}

impl RecipeForm {
    async fn read(mut mp: Multipart) -> AppResult<Self> {
        let mut fields = HashMap::new();
        let mut image = None;
        while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else { continue };
            if name == "imagem" {
                let item = UploadItem::from_field(field).await?;
                image = (!item.is_empty()).then_some(item);
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                fields.insert(name, value);
            }
        }
        Ok(Self { fields, image })
    }

    fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("").trim()
    }

    fn number<T: std::str::FromStr>(&self, key: &str, label: &str) -> AppResult<T> {
        self.get(key)
            .replace(',', ".")
            .parse()
            .map_err(|_| AppError::Validation(format!("Valor inválido para {}", label)))
    }

    fn values(&self, image: Option<String>) -> RecipeFormValues {
        RecipeFormValues {
            name: self.get("nome").into(),
            author: self.get("autor").into(),
            preparation: self.get("preparacao").into(),
            prep_time_minutes: self.get("tempo_preparacao").into(),
            cost: self.get("custo").into(),
            servings: self.get("doses").into(),
            image,
            ingredients_json: self.get("ingredientes").into(),
        }
    }

    fn selected(&self, key: &str) -> Option<i64> {
        self.get(key).parse().ok()
    }

    fn to_input(&self) -> AppResult<RecipeInput> {
        validate(RecipeInput {
            name: self.get("nome").into(),
            author: self.get("autor").into(),
            preparation: self.get("preparacao").into(),
            prep_time_minutes: self.number("tempo_preparacao", "tempo de preparação")?,
            cost: self.number("custo", "custo")?,
            servings: self.number("doses", "doses")?,
            image: None,
            category_id: self.number("categoria_id", "categoria")?,
            difficulty_id: self.number("dificuldade_id", "dificuldade")?,
            ingredients: Some(parse_ingredients_field(self.get("ingredientes"))?),
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn recipe_form_page(
    db: &PgPool,
    admin: Identity,
    title: &'static str,
    action: String,
    values: RecipeFormValues,
    category_id: Option<i64>,
    difficulty_id: Option<i64>,
    error: Option<String>,
) -> Result<Response, WebError> {
    let categories = Category::find_all(db).await?;
    let difficulties = Difficulty::find_all(db).await?;
    render(RecipeFormTemplate {
        title,
        user: Some(admin),
        action,
        values,
        categories: SelectOption::build(&categories, category_id, |c| (c.id, c.name.clone())),
        difficulties: SelectOption::build(&difficulties, difficulty_id, |d| (d.id, d.level.clone())),
        ingredients: Ingredient::find_all(db).await?,
        error,
    })
}

fn blank_values(admin: &Identity) -> RecipeFormValues {
    RecipeFormValues {
        author: admin.name.clone(),
        servings: "1".into(),
        ..Default::default()
    }
}

pub async fn recipe_new_page(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
) -> Result<Response, WebError> {
    let values = blank_values(&admin);
    recipe_form_page(
        &state.db,
        admin,
        "Nova receita",
        "/backoffice/receitas/nova".into(),
        values,
        None,
        None,
        None,
    )
    .await
}

#[instrument(skip(state, admin, mp), fields(user_id = admin.id))]
pub async fn recipe_create(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    mp: Multipart,
) -> Result<Response, WebError> {
    let mut form = match RecipeForm::read(mp).await {
        Ok(form) => form,
        Err(e @ AppError::PayloadTooLarge { .. }) => {
            let values = blank_values(&admin);
            return recipe_form_page(
                &state.db,
                admin,
                "Nova receita",
                "/backoffice/receitas/nova".into(),
                values,
                None,
                None,
                Some(e.to_string()),
            )
            .await;
        }
        Err(e) => return Err(e.into()),
    };
    let image = form.image.take();
    let rerender = |admin, msg: String| {
        recipe_form_page(
            &state.db,
            admin,
            "Nova receita",
            "/backoffice/receitas/nova".into(),
            form.values(None),
            form.selected("categoria_id"),
            form.selected("dificuldade_id"),
            Some(msg),
        )
    };

    let mut input = match form.to_input() {
        Ok(input) => input,
        Err(AppError::Validation(msg)) => return rerender(admin, msg).await,
        Err(e) => return Err(e.into()),
    };

    if let Some(item) = image {
        match store_recipe_image(state.storage.as_ref(), item).await {
            Ok(path) => input.image = Some(path),
            Err(e @ (AppError::UnsupportedMediaType(_) | AppError::PayloadTooLarge { .. })) => {
                return rerender(admin, e.to_string()).await
            }
            Err(e) => return Err(e.into()),
        }
    }

    match Recipe::create(&state.db, &input, admin.id).await {
        Ok(id) => {
            info!(recipe_id = id, "recipe created from backoffice");
            Ok(back("receitas", "ok", "criada"))
        }
        Err(e) => {
            discard_image(state.storage.as_ref(), input.image.as_deref()).await;
            if e.as_database_error().is_some_and(|d| d.is_foreign_key_violation()) {
                return rerender(admin, "Categoria, dificuldade ou ingrediente inexistente".into()).await;
            }
            Err(e.into())
        }
    }
}

fn ingredients_json(items: &[RecipeIngredient]) -> String {
    let list: Vec<_> = items
        .iter()
        .map(|i| json!({ "id": i.id, "quantidade": i.quantity }))
        .collect();
    serde_json::Value::from(list).to_string()
}

/// Edit form filled from the stored recipe.
async fn stored_recipe_page(
    db: &PgPool,
    admin: Identity,
    recipe: &Recipe,
    error: Option<String>,
) -> Result<Response, WebError> {
    let ingredients = Recipe::ingredients(db, recipe.id).await?;
    let values = RecipeFormValues {
        name: recipe.name.clone(),
        author: recipe.author.clone(),
        preparation: recipe.preparation.clone(),
        prep_time_minutes: recipe.prep_time_minutes.to_string(),
        cost: format!("{:.2}", recipe.cost),
        servings: recipe.servings.to_string(),
        image: recipe.image.clone(),
        ingredients_json: ingredients_json(&ingredients),
    };
    recipe_form_page(
        db,
        admin,
        "Editar receita",
        format!("/backoffice/receitas/editar/{}", recipe.id),
        values,
        Some(recipe.category_id),
        Some(recipe.difficulty_id),
        error,
    )
    .await
}

pub async fn recipe_edit_page(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let Some(recipe) = Recipe::find_by_id(&state.db, id).await? else {
        return Ok(back("receitas", "erro", "inexistente"));
    };
    stored_recipe_page(&state.db, admin, &recipe, None).await
}

#[instrument(skip(state, admin, mp), fields(user_id = admin.id))]
pub async fn recipe_update(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    Path(id): Path<i64>,
    mp: Multipart,
) -> Result<Response, WebError> {
    let Some(current) = Recipe::find_by_id(&state.db, id).await? else {
        return Ok(back("receitas", "erro", "inexistente"));
    };
    let mut form = match RecipeForm::read(mp).await {
        Ok(form) => form,
        Err(e @ AppError::PayloadTooLarge { .. }) => {
            return stored_recipe_page(&state.db, admin, &current, Some(e.to_string())).await
        }
        Err(e) => return Err(e.into()),
    };
    let image = form.image.take();
    let rerender = |admin, msg: String| {
        recipe_form_page(
            &state.db,
            admin,
            "Editar receita",
            format!("/backoffice/receitas/editar/{}", id),
            form.values(current.image.clone()),
            form.selected("categoria_id"),
            form.selected("dificuldade_id"),
            Some(msg),
        )
    };

    let mut input = match form.to_input() {
        Ok(input) => input,
        Err(AppError::Validation(msg)) => return rerender(admin, msg).await,
        Err(e) => return Err(e.into()),
    };

    if let Some(item) = image {
        match store_recipe_image(state.storage.as_ref(), item).await {
            Ok(path) => input.image = Some(path),
            Err(e @ (AppError::UnsupportedMediaType(_) | AppError::PayloadTooLarge { .. })) => {
                return rerender(admin, e.to_string()).await
            }
            Err(e) => return Err(e.into()),
        }
    }

    match Recipe::update(&state.db, id, &input).await {
        Ok(true) => {
            if input.image.is_some() {
                release_image(&state.db, state.storage.as_ref(), id, current.image.as_deref()).await;
            }
            info!(recipe_id = id, "recipe updated from backoffice");
            Ok(back("receitas", "ok", "atualizada"))
        }
        Ok(false) => {
            discard_image(state.storage.as_ref(), input.image.as_deref()).await;
            Ok(back("receitas", "erro", "inexistente"))
        }
        Err(e) => {
            discard_image(state.storage.as_ref(), input.image.as_deref()).await;
            if e.as_database_error().is_some_and(|d| d.is_foreign_key_violation()) {
                return rerender(admin, "Categoria, dificuldade ou ingrediente inexistente".into()).await;
            }
            Err(e.into())
        }
    }
}

#[instrument(skip(state, admin), fields(user_id = admin.id))]
pub async fn recipe_delete(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let Some(current) = Recipe::find_by_id(&state.db, id).await? else {
        return Ok(back("receitas", "erro", "inexistente"));
    };
    if !Recipe::delete(&state.db, id).await? {
        return Ok(back("receitas", "erro", "inexistente"));
    }
    release_image(&state.db, state.storage.as_ref(), id, current.image.as_deref()).await;
    info!(recipe_id = id, "recipe deleted from backoffice");
    Ok(back("receitas", "ok", "eliminada"))
}

// --- categories ---

async fn categories_page(
    db: &PgPool,
    admin: Identity,
    editing: Option<Category>,
    notice: Notice,
) -> Result<Response, WebError> {
    render(CategoriesAdminTemplate {
        title: "Categorias",
        user: Some(admin),
        categories: Category::find_all(db).await?,
        editing,
        notice: notice.notice(),
        error: notice.error(),
    })
}

pub async fn categories_list(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    Query(notice): Query<Notice>,
) -> Result<Response, WebError> {
    categories_page(&state.db, admin, None, notice).await
}

pub async fn category_edit_page(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let Some(category) = Category::find_by_id(&state.db, id).await? else {
        return Ok(back("categorias", "erro", "inexistente"));
    };
    categories_page(&state.db, admin, Some(category), Notice::default()).await
}

#[instrument(skip(state, _admin, form))]
pub async fn category_create(
    State(state): State<AppState>,
    WebAdmin(_admin): WebAdmin,
    Form(form): Form<CategoryInput>,
) -> Result<Response, WebError> {
    let Some(input) = form.normalized() else {
        return Ok(back("categorias", "erro", "invalido"));
    };
    match Category::create(&state.db, &input).await {
        Ok(id) => {
            info!(category_id = id, "category created");
            Ok(back("categorias", "ok", "criada"))
        }
        Err(e) => Ok(back("categorias", "erro", constraint_code(e)?)),
    }
}

#[instrument(skip(state, _admin, form))]
pub async fn category_update(
    State(state): State<AppState>,
    WebAdmin(_admin): WebAdmin,
    Path(id): Path<i64>,
    Form(form): Form<CategoryInput>,
) -> Result<Response, WebError> {
    let Some(input) = form.normalized() else {
        return Ok(back("categorias", "erro", "invalido"));
    };
    match Category::update(&state.db, id, &input).await {
        Ok(true) => Ok(back("categorias", "ok", "atualizada")),
        Ok(false) => Ok(back("categorias", "erro", "inexistente")),
        Err(e) => Ok(back("categorias", "erro", constraint_code(e)?)),
    }
}

#[instrument(skip(state, _admin))]
pub async fn category_delete(
    State(state): State<AppState>,
    WebAdmin(_admin): WebAdmin,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    match Category::delete(&state.db, id).await {
        Ok(true) => Ok(back("categorias", "ok", "eliminada")),
        Ok(false) => Ok(back("categorias", "erro", "inexistente")),
        Err(e) => {
            warn!(category_id = id, error = %e, "category delete refused");
            Ok(back("categorias", "erro", constraint_code(e)?))
        }
    }
}

// --- ingredients ---

async fn ingredients_page(
    db: &PgPool,
    admin: Identity,
    editing: Option<Ingredient>,
    notice: Notice,
) -> Result<Response, WebError> {
    render(IngredientsAdminTemplate {
        title: "Ingredientes",
        user: Some(admin),
        ingredients: Ingredient::find_all(db).await?,
        editing,
        notice: notice.notice(),
        error: notice.error(),
    })
}

pub async fn ingredients_list(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    Query(notice): Query<Notice>,
) -> Result<Response, WebError> {
    ingredients_page(&state.db, admin, None, notice).await
}

pub async fn ingredient_edit_page(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let Some(ingredient) = Ingredient::find_by_id(&state.db, id).await? else {
        return Ok(back("ingredientes", "erro", "inexistente"));
    };
    ingredients_page(&state.db, admin, Some(ingredient), Notice::default()).await
}

#[instrument(skip(state, _admin, form))]
pub async fn ingredient_create(
    State(state): State<AppState>,
    WebAdmin(_admin): WebAdmin,
    Form(form): Form<IngredientInput>,
) -> Result<Response, WebError> {
    let name = form.name.trim();
    if name.is_empty() {
        return Ok(back("ingredientes", "erro", "invalido"));
    }
    if Ingredient::find_by_name(&state.db, name).await?.is_some() {
        return Ok(back("ingredientes", "erro", "duplicado"));
    }
    match Ingredient::create(&state.db, name).await {
        Ok(id) => {
            info!(ingredient_id = id, "ingredient created");
            Ok(back("ingredientes", "ok", "criada"))
        }
        Err(e) => Ok(back("ingredientes", "erro", constraint_code(e)?)),
    }
}

#[instrument(skip(state, _admin, form))]
pub async fn ingredient_update(
    State(state): State<AppState>,
    WebAdmin(_admin): WebAdmin,
    Path(id): Path<i64>,
    Form(form): Form<IngredientInput>,
) -> Result<Response, WebError> {
    let name = form.name.trim();
    if name.is_empty() {
        return Ok(back("ingredientes", "erro", "invalido"));
    }
    match Ingredient::update(&state.db, id, name).await {
        Ok(true) => Ok(back("ingredientes", "ok", "atualizada")),
        Ok(false) => Ok(back("ingredientes", "erro", "inexistente")),
        Err(e) => Ok(back("ingredientes", "erro", constraint_code(e)?)),
    }
}

#[instrument(skip(state, _admin))]
pub async fn ingredient_delete(
    State(state): State<AppState>,
    WebAdmin(_admin): WebAdmin,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    match Ingredient::delete(&state.db, id).await? {
        true => Ok(back("ingredientes", "ok", "eliminada")),
        false => Ok(back("ingredientes", "erro", "inexistente")),
    }
}

// --- users ---

pub async fn users_list(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    Query(notice): Query<Notice>,
) -> Result<Response, WebError> {
    render(UsersAdminTemplate {
        title: "Utilizadores",
        user: Some(admin),
        users: User::find_all(&state.db).await?,
        notice: notice.notice(),
        error: notice.error(),
    })
}

#[instrument(skip(state, admin), fields(admin_id = admin.id))]
pub async fn user_delete(
    State(state): State<AppState>,
    WebAdmin(admin): WebAdmin,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    if id == admin.id {
        warn!("admin tried to delete own account");
        return Ok(back("utilizadores", "erro", "proprio"));
    }
    if User::delete(&state.db, id).await? {
        info!(user_id = id, "user deleted");
        Ok(back("utilizadores", "ok", "eliminada"))
    } else {
        Ok(back("utilizadores", "erro", "inexistente"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_codes_map_to_messages() {
        let n = Notice { ok: Some("criada".into()), erro: Some("proprio".into()) };
        assert_eq!(n.notice().as_deref(), Some("Criado com sucesso"));
        assert_eq!(n.error().as_deref(), Some("Não pode eliminar a sua própria conta"));

        let unknown = Notice { ok: Some("<script>".into()), erro: None };
        assert_eq!(unknown.notice(), None);
    }

    #[test]
    fn ingredient_links_render_as_form_json() {
        let items = vec![RecipeIngredient {
            id: 7,
            name: "Sal".into(),
            quantity: "q.b.".into(),
        }];
        let parsed = parse_ingredients_field(&ingredients_json(&items)).unwrap();
        assert_eq!(parsed[0].ingredient_id, 7);
        assert_eq!(parsed[0].quantity, "q.b.");
    }
}
