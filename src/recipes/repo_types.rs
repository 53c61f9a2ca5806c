use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Recipe row joined with its category, difficulty and owner names.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub author: String,
    pub preparation: String,
    pub prep_time_minutes: i32,
    pub cost: f64,
    pub servings: i32,
    pub image: Option<String>,
    pub category_id: i64,
    pub category_name: String,
    pub difficulty_id: i64,
    pub difficulty_level: String,
    pub user_id: Option<i64>, // NULL once the owner account is deleted
    pub owner_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeIngredient {
    pub id: i64,
    pub name: String,
    pub quantity: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Difficulty {
    pub id: i64,
    pub level: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngredientQuantity {
    #[serde(alias = "id")]
    pub ingredient_id: i64,
    #[serde(alias = "quantidade")]
    pub quantity: String,
}

/// Writable recipe fields, shared by create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeInput {
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(alias = "autor")]
    pub author: String,
    #[serde(alias = "preparacao")]
    pub preparation: String,
    #[serde(alias = "tempo_preparacao")]
    pub prep_time_minutes: i32,
    #[serde(alias = "custo")]
    pub cost: f64,
    #[serde(alias = "doses")]
    pub servings: i32,
    #[serde(default, alias = "imagem")]
    pub image: Option<String>,
    #[serde(alias = "categoria_id")]
    pub category_id: i64,
    #[serde(alias = "dificuldade_id")]
    pub difficulty_id: i64,
    /// `None` leaves existing ingredient links untouched on update.
    #[serde(default, alias = "ingredientes")]
    pub ingredients: Option<Vec<IngredientQuantity>>,
}

/// Optional search predicates, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub term: Option<String>,
    pub category_id: Option<i64>,
    pub difficulty_id: Option<i64>,
}

impl RecipeFilter {
    pub fn term(&self) -> Option<&str> {
        self.term.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.term().is_none() && self.category_id.is_none() && self.difficulty_id.is_none()
    }
}
