use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::response::ApiResponse;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Email ou password incorretos")]
    InvalidCredentials,

    #[error("Autenticação necessária")]
    Unauthenticated,

    #[error("Acesso negado")]
    Forbidden,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Tipo de ficheiro não permitido ({0}). Use JPG, PNG, GIF ou WEBP")]
    UnsupportedMediaType(String),

    #[error("Ficheiro muito grande. Máximo: {}MB", .limit / (1024 * 1024))]
    PayloadTooLarge { limit: usize },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("upstream service error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Database(_)
            | AppError::Upstream(_)
            | AppError::Template(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to a client; server-side failures stay generic.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Template(_) | AppError::Internal(_) => {
                "Erro no servidor".into()
            }
            AppError::Upstream(_) => "Erro ao contactar o serviço externo de receitas".into(),
            other => other.to_string(),
        }
    }

    fn log(&self) {
        if self.status().is_server_error() {
            error!(error = %self, "request failed");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        (status, Json(ApiResponse::<()>::error(self.public_message()))).into_response()
    }
}

/// Error for HTML routes: auth failures become redirects instead of JSON.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct WebError(#[from] pub AppError);

impl From<sqlx::Error> for WebError {
    fn from(e: sqlx::Error) -> Self {
        WebError(AppError::Database(e))
    }
}

impl From<askama::Error> for WebError {
    fn from(e: askama::Error) -> Self {
        WebError(AppError::Template(e))
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self.0 {
            AppError::Unauthenticated => Redirect::to("/login").into_response(),
            AppError::Forbidden => Redirect::to("/").into_response(),
            err => {
                err.log();
                let status = err.status();
                let body = format!(
                    "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head>\
                     <body><h1>{}</h1><p><a href=\"/\">Voltar</a></p></body></html>",
                    status.as_u16(),
                    escape(&err.public_message()),
                );
                (status, Html(body)).into_response()
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("Receita não encontrada").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::UnsupportedMediaType("text/plain".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            AppError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn database_details_are_not_exposed() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.public_message(), "Erro no servidor");
        assert_eq!(
            AppError::NotFound("Receita não encontrada").public_message(),
            "Receita não encontrada"
        );
        assert_eq!(
            AppError::PayloadTooLarge { limit: 5 * 1024 * 1024 }.public_message(),
            "Ficheiro muito grande. Máximo: 5MB"
        );
    }

    #[test]
    fn web_auth_errors_redirect() {
        let res = WebError(AppError::Unauthenticated).into_response();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()["location"], "/login");

        let res = WebError(AppError::Forbidden).into_response();
        assert_eq!(res.headers()["location"], "/");
    }
}
