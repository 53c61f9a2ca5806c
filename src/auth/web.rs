use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    auth::{
        claims::Identity,
        extractors::WebUser,
        jwt::JwtKeys,
        repo_types::{Role, User},
        services::{self, Registration, TOKEN_COOKIE},
    },
    error::{AppError, WebError},
    state::AppState,
    web::templates::{render, LoginTemplate, RegisterTemplate},
};

pub fn web_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/registo", get(register_page).post(register_submit))
        .route("/logout", get(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

fn session_cookie(token: String, ttl_minutes: i64) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(ttl_minutes))
        .build()
}

/// Signs the user in and sends them to their landing page.
fn start_session(state: &AppState, jar: CookieJar, user: &User) -> Result<Response, WebError> {
    let keys = JwtKeys::from_ref(state);
    let token = keys
        .issue(&Identity::from(user))
        .map_err(|e| AppError::Internal(e.into()))?;
    let target = if user.role == Role::Admin { "/backoffice" } else { "/" };
    let jar = jar.add(session_cookie(token, keys.ttl_minutes()));
    Ok((jar, Redirect::to(target)).into_response())
}

pub async fn login_page(visitor: Option<WebUser>) -> Result<Response, WebError> {
    if visitor.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    render(LoginTemplate::new(None, String::new()))
}

#[instrument(skip(state, jar, form), fields(email = %form.email))]
pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    match services::login(&state.db, &form.email, &form.password).await {
        Ok(user) => start_session(&state, jar, &user),
        Err(e @ (AppError::InvalidCredentials | AppError::Validation(_))) => {
            render(LoginTemplate::new(Some(e.to_string()), form.email))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn register_page(visitor: Option<WebUser>) -> Result<Response, WebError> {
    if visitor.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    render(RegisterTemplate::new(None, String::new(), String::new()))
}

#[instrument(skip(state, jar, form), fields(email = %form.email))]
pub async fn register_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, WebError> {
    let rerender = |msg: String| {
        render(RegisterTemplate::new(Some(msg), form.nome.clone(), form.email.clone()))
    };

    if form.password_confirm.is_empty() {
        return rerender("Por favor, preencha todos os campos".into());
    }
    if form.password != form.password_confirm {
        return rerender("As passwords não coincidem".into());
    }

    let registration = Registration {
        name: &form.nome,
        email: &form.email,
        password: &form.password,
    };
    match services::register(&state.db, registration).await {
        Ok(user) => start_session(&state, jar, &user),
        Err(e @ (AppError::Validation(_) | AppError::Conflict(_))) => rerender(e.to_string()),
        Err(e) => Err(e.into()),
    }
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let mut cookie = Cookie::from(TOKEN_COOKIE);
    cookie.set_path("/");
    (jar.remove(cookie), Redirect::to("/login"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only_and_scoped_to_root() {
        let c = session_cookie("abc".into(), 60 * 24);
        assert_eq!(c.name(), TOKEN_COOKIE);
        assert_eq!(c.value(), "abc");
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.path(), Some("/"));
        assert_eq!(c.max_age(), Some(time::Duration::hours(24)));
    }
}
