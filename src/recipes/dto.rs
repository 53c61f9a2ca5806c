use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    recipes::repo_types::{Recipe, RecipeFilter, RecipeIngredient},
};

/// Query string of `/pesquisa` and `GET /api/receitas`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub termo: Option<String>,
    pub categoria: Option<String>,
    pub dificuldade: Option<String>,
}

fn optional_id(raw: Option<&str>, label: &str) -> AppResult<Option<i64>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("Filtro de {} inválido", label))),
    }
}

impl SearchParams {
    /// Empty values are treated as absent filters.
    pub fn to_filter(&self) -> AppResult<RecipeFilter> {
        Ok(RecipeFilter {
            term: self
                .termo
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            category_id: optional_id(self.categoria.as_deref(), "categoria")?,
            difficulty_id: optional_id(self.dificuldade.as_deref(), "dificuldade")?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeDetails {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub ingredients: Vec<RecipeIngredient>,
}

#[derive(Debug, Serialize)]
pub struct CreatedRecipe {
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_params_mean_no_filter() {
        let p = SearchParams {
            termo: Some("  ".into()),
            categoria: Some(String::new()),
            dificuldade: None,
        };
        assert!(p.to_filter().unwrap().is_empty());
    }

    #[test]
    fn numeric_params_become_ids() {
        let p = SearchParams {
            termo: Some(" bolo ".into()),
            categoria: Some("3".into()),
            dificuldade: Some("1".into()),
        };
        let f = p.to_filter().unwrap();
        assert_eq!(f.term.as_deref(), Some("bolo"));
        assert_eq!(f.category_id, Some(3));
        assert_eq!(f.difficulty_id, Some(1));

        let bad = SearchParams { categoria: Some("abc".into()), ..Default::default() };
        assert!(matches!(bad.to_filter(), Err(AppError::Validation(_))));
    }
}
