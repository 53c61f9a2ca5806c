use std::collections::HashSet;

use sqlx::PgPool;
use tracing::warn;

use crate::{
    error::{AppError, AppResult},
    images::services::discard_image,
    recipes::repo_types::{IngredientQuantity, Recipe, RecipeInput},
    storage::ImageStore,
};

fn required(value: &str, label: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("O campo {} é obrigatório", label)));
    }
    Ok(value.to_string())
}

/// Trims text fields and checks ranges; returns the cleaned input.
pub fn validate(input: RecipeInput) -> AppResult<RecipeInput> {
    let name = required(&input.name, "nome")?;
    let author = required(&input.author, "autor")?;
    let preparation = required(&input.preparation, "preparação")?;

    if input.prep_time_minutes < 0 {
        return Err(AppError::Validation("O tempo de preparação não pode ser negativo".into()));
    }
    if !input.cost.is_finite() || input.cost < 0.0 {
        return Err(AppError::Validation("Custo inválido".into()));
    }
    if input.servings < 1 {
        return Err(AppError::Validation("O número de doses deve ser pelo menos 1".into()));
    }

    let ingredients = match input.ingredients {
        Some(items) => Some(validate_ingredients(items)?),
        None => None,
    };
    let image = input.image.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    Ok(RecipeInput {
        name,
        author,
        preparation,
        image,
        ingredients,
        ..input
    })
}

fn validate_ingredients(items: Vec<IngredientQuantity>) -> AppResult<Vec<IngredientQuantity>> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| {
            if !seen.insert(item.ingredient_id) {
                return Err(AppError::Validation("Ingrediente repetido na receita".into()));
            }
            let quantity = required(&item.quantity, "quantidade")?;
            Ok(IngredientQuantity { quantity, ..item })
        })
        .collect()
}

/// Parses the `ingredientes` form field: `[{"id": 1, "quantidade": "200 g"}]`.
/// A blank field means no ingredients.
pub fn parse_ingredients_field(raw: &str) -> AppResult<Vec<IngredientQuantity>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|_| AppError::Validation("Lista de ingredientes inválida".into()))
}

/// Drops the stored file of a recipe's old image unless another recipe still
/// points at it. Paths come from clients, so two recipes can share one.
pub async fn release_image(db: &PgPool, store: &dyn ImageStore, recipe_id: i64, image: Option<&str>) {
    let Some(path) = image else { return };
    match Recipe::image_in_use(db, path, recipe_id).await {
        Ok(false) => discard_image(store, Some(path)).await,
        Ok(true) => warn!(%path, recipe_id, "image still used by another recipe, keeping it"),
        Err(e) => warn!(error = %e, %path, "image reference check failed, keeping it"),
    }
}
