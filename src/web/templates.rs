use askama::Template;
use axum::response::{Html, IntoResponse, Response};

use crate::{
    auth::{claims::Identity, repo_types::User},
    categories::repo::Category,
    error::WebError,
    ingredients::repo::Ingredient,
    recipes::repo_types::{Recipe, RecipeIngredient},
};

pub fn render<T: Template>(template: T) -> Result<Response, WebError> {
    Ok(Html(template.render()?).into_response())
}

/// Entry of a `<select>`.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub id: i64,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn build<T>(
        items: &[T],
        selected: Option<i64>,
        f: impl Fn(&T) -> (i64, String),
    ) -> Vec<SelectOption> {
        items
            .iter()
            .map(|item| {
                let (id, label) = f(item);
                SelectOption { id, label, selected: selected == Some(id) }
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub title: &'static str,
    pub user: Option<Identity>,
    pub error: Option<String>,
    pub email: String,
}

impl LoginTemplate {
    pub fn new(error: Option<String>, email: String) -> Self {
        Self { title: "Entrar", user: None, error, email }
    }
}

#[derive(Template)]
#[template(path = "registo.html")]
pub struct RegisterTemplate {
    pub title: &'static str,
    pub user: Option<Identity>,
    pub error: Option<String>,
    pub nome: String,
    pub email: String,
}

impl RegisterTemplate {
    pub fn new(error: Option<String>, nome: String, email: String) -> Self {
        Self { title: "Registo", user: None, error, nome, email }
    }
}

// --- frontoffice ---

#[derive(Template)]
#[template(path = "frontoffice/index.html")]
pub struct IndexTemplate {
    pub title: &'static str,
    pub user: Option<Identity>,
    pub recipes: Vec<Recipe>,
    pub categories: Vec<Category>,
}

#[derive(Template)]
#[template(path = "frontoffice/receita.html")]
pub struct RecipeTemplate {
    pub title: String,
    pub user: Option<Identity>,
    pub recipe: Recipe,
    pub ingredients: Vec<RecipeIngredient>,
}

#[derive(Template)]
#[template(path = "frontoffice/categoria.html")]
pub struct CategoryTemplate {
    pub title: String,
    pub user: Option<Identity>,
    pub category: Category,
    pub recipes: Vec<Recipe>,
}

#[derive(Template)]
#[template(path = "frontoffice/pesquisa.html")]
pub struct SearchTemplate {
    pub title: &'static str,
    pub user: Option<Identity>,
    pub termo: String,
    pub categories: Vec<SelectOption>,
    pub difficulties: Vec<SelectOption>,
    pub recipes: Vec<Recipe>,
    pub error: Option<String>,
}

// --- backoffice ---

#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardStats {
    pub recipes: i64,
    pub users: i64,
    pub categories: i64,
    pub ingredients: i64,
}

#[derive(Template)]
#[template(path = "backoffice/dashboard.html")]
pub struct DashboardTemplate {
    pub title: &'static str,
    pub user: Option<Identity>,
    pub stats: DashboardStats,
    pub recent: Vec<Recipe>,
}

#[derive(Template)]
#[template(path = "backoffice/receitas.html")]
pub struct RecipesAdminTemplate {
    pub title: &'static str,
    pub user: Option<Identity>,
    pub recipes: Vec<Recipe>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Values echoed back into the recipe form.
#[derive(Debug, Clone, Default)]
pub struct RecipeFormValues {
    pub name: String,
    pub author: String,
    pub preparation: String,
    pub prep_time_minutes: String,
    pub cost: String,
    pub servings: String,
    pub image: Option<String>,
    pub ingredients_json: String,
}

#[derive(Template)]
#[template(path = "backoffice/receita_form.html")]
pub struct RecipeFormTemplate {
    pub title: &'static str,
    pub user: Option<Identity>,
    pub action: String,
    pub values: RecipeFormValues,
    pub categories: Vec<SelectOption>,
    pub difficulties: Vec<SelectOption>,
    pub ingredients: Vec<Ingredient>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "backoffice/categorias.html")]
pub struct CategoriesAdminTemplate {
    pub title: &'static str,
    pub user: Option<Identity>,
    pub categories: Vec<Category>,
    pub editing: Option<Category>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "backoffice/ingredientes.html")]
pub struct IngredientsAdminTemplate {
    pub title: &'static str,
    pub user: Option<Identity>,
    pub ingredients: Vec<Ingredient>,
    pub editing: Option<Ingredient>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "backoffice/utilizadores.html")]
pub struct UsersAdminTemplate {
    pub title: &'static str,
    pub user: Option<Identity>,
    pub users: Vec<User>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_page_escapes_echoed_email() {
        let html = LoginTemplate::new(Some("Email ou password incorretos".into()), "<b>@x.pt".into())
            .render()
            .unwrap();
        assert!(html.contains("Email ou password incorretos"));
        assert!(html.contains("&lt;b&gt;@x.pt"));
        assert!(!html.contains("<b>@x.pt"));
    }

    #[test]
    fn select_options_mark_selected_entry() {
        let opts = SelectOption::build(&[(1_i64, "Fácil"), (2, "Médio")], Some(2), |(id, l)| {
            (*id, l.to_string())
        });
        assert!(!opts[0].selected);
        assert!(opts[1].selected);
        assert_eq!(opts[1].label, "Médio");
    }
}
