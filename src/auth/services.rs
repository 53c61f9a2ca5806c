use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    auth::{
        claims::Identity,
        jwt::JwtKeys,
        password,
        repo_types::{NewUser, Role, User},
    },
    error::{AppError, AppResult},
};

/// Cookie carrying the token for browser sessions.
pub const TOKEN_COOKIE: &str = "token";

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Cookie first, then `Authorization: Bearer`.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(TOKEN_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> AppResult<Identity> {
    let token = token_from_headers(headers).ok_or(AppError::Unauthenticated)?;
    match keys.verify(&token) {
        Ok(claims) => Ok(claims.into()),
        Err(e) => {
            warn!(error = %e, "invalid or expired token");
            Err(AppError::Unauthenticated)
        }
    }
}

pub fn require_role(who: Identity, role: Role) -> AppResult<Identity> {
    match (role, who.role) {
        (Role::User, _) | (Role::Admin, Role::Admin) => Ok(who),
        (Role::Admin, Role::User) => {
            warn!(user_id = who.id, "admin role required");
            Err(AppError::Forbidden)
        }
    }
}

/// Checks an email/password pair against the stored hash.
pub async fn login(db: &PgPool, email: &str, password: &str) -> AppResult<User> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation("Email e password são obrigatórios".into()));
    }

    let Some(user) = User::find_by_email(db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    let ok = password::verify_password_async(password.to_string(), user.password_hash.clone()).await?;
    if !ok {
        warn!(email = %email, user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = user.id, "user logged in");
    Ok(user)
}

pub struct Registration<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

pub(crate) fn validate_registration(r: &Registration<'_>) -> AppResult<String> {
    let email = normalize_email(r.email);
    if r.name.trim().is_empty() || email.is_empty() || r.password.is_empty() {
        return Err(AppError::Validation("Por favor, preencha todos os campos".into()));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Email inválido".into()));
    }
    if r.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "A password deve ter pelo menos {} caracteres",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(email)
}

/// Creates a regular account; fails with `Conflict` when the email is taken.
pub async fn register(db: &PgPool, r: Registration<'_>) -> AppResult<User> {
    let email = validate_registration(&r)?;

    if User::find_by_email(db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Este email já está registado".into()));
    }

    let hash = password::hash_password_async(r.password.to_string()).await?;
    let id = User::create(
        db,
        &NewUser {
            name: r.name.trim(),
            email: &email,
            password_hash: &hash,
            role: Role::User,
        },
    )
    .await
    .map_err(|e| match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("Este email já está registado".into())
        }
        _ => AppError::Database(e),
    })?;

    let user = User::find_by_id(db, id)
        .await?
        .ok_or(AppError::NotFound("Utilizador não encontrado"))?;
    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::tests::{identity, make_keys};
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.append(*k, HeaderValue::from_str(v).unwrap());
        }
        h
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.pt"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.pt"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn cookie_is_preferred_over_bearer() {
        let h = headers(&[("cookie", "token=from-cookie"), ("authorization", "Bearer from-header")]);
        assert_eq!(token_from_headers(&h).as_deref(), Some("from-cookie"));

        let h = headers(&[("authorization", "Bearer from-header")]);
        assert_eq!(token_from_headers(&h).as_deref(), Some("from-header"));

        let h = headers(&[("authorization", "Basic dXNlcjpwdw==")]);
        assert_eq!(token_from_headers(&h), None);
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn authenticate_returns_issued_identity() {
        let keys = make_keys("s", "i", "a");
        let who = identity(Role::User);
        let token = keys.issue(&who).unwrap();

        let via_header = headers(&[("authorization", &format!("Bearer {}", token))]);
        assert_eq!(authenticate(&via_header, &keys).unwrap(), who);

        let via_cookie = headers(&[("cookie", &format!("token={}", token))]);
        assert_eq!(authenticate(&via_cookie, &keys).unwrap(), who);
    }

    #[test]
    fn authenticate_fails_without_or_with_bad_token() {
        let keys = make_keys("s", "i", "a");
        assert!(matches!(authenticate(&HeaderMap::new(), &keys), Err(AppError::Unauthenticated)));

        let other = make_keys("other", "i", "a").issue(&identity(Role::User)).unwrap();
        let h = headers(&[("authorization", &format!("Bearer {}", other))]);
        assert!(matches!(authenticate(&h, &keys), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn require_role_checks_admin() {
        assert!(require_role(identity(Role::Admin), Role::Admin).is_ok());
        assert!(require_role(identity(Role::User), Role::User).is_ok());
        assert!(require_role(identity(Role::Admin), Role::User).is_ok());
        assert!(matches!(
            require_role(identity(Role::User), Role::Admin),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn registration_validation() {
        let ok = Registration { name: "u1", email: " U1@Example.com ", password: "pw123456" };
        assert_eq!(validate_registration(&ok).unwrap(), "u1@example.com");

        let short = Registration { name: "u1", email: "u1@example.com", password: "12345" };
        assert!(matches!(validate_registration(&short), Err(AppError::Validation(_))));

        let no_name = Registration { name: " ", email: "u1@example.com", password: "pw123456" };
        assert!(matches!(validate_registration(&no_name), Err(AppError::Validation(_))));

        let bad_email = Registration { name: "u1", email: "u1", password: "pw123456" };
        assert!(matches!(validate_registration(&bad_email), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn register_then_login() {
        let Some(db) = crate::db::test_pool().await else { return };
        let email = format!("svc-{}@example.com", rand::random::<u32>());

        let user = register(&db, Registration { name: "u1", email: &email, password: "pw123456" })
            .await
            .expect("register");
        assert_eq!(user.role, Role::User);

        let again = register(&db, Registration { name: "u1", email: &email, password: "pw123456" }).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        assert_eq!(login(&db, &email, "pw123456").await.unwrap().id, user.id);
        assert!(matches!(
            login(&db, &email, "wrong-pass").await,
            Err(AppError::InvalidCredentials)
        ));

        User::delete(&db, user.id).await.unwrap();
    }
}
