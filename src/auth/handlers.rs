use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        claims::Identity,
        dto::{AuthResponse, LoginRequest, RegisterRequest, UpdateMeRequest},
        extractors::{AdminUser, AuthUser},
        jwt::JwtKeys,
        password,
        repo_types::User,
        services::{self, Registration, MIN_PASSWORD_LEN},
    },
    error::{AppError, AppResult},
    response::ApiResponse,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", get(get_me).put(update_me))
        .route("/utilizadores", get(list_users))
}

fn issue(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let who = Identity::from(user);
    let token = JwtKeys::from_ref(state)
        .issue(&who)
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(AuthResponse { token, user: who })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let user = services::login(&state.db, &payload.email, &payload.password).await?;
    let body = issue(&state, &user)?;
    Ok(Json(ApiResponse::ok(body).with_message("Login efetuado com sucesso")))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    let user = services::register(
        &state.db,
        Registration {
            name: &payload.name,
            email: &payload.email,
            password: &payload.password,
        },
    )
    .await?;
    let body = issue(&state, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(body).with_message("Registo efetuado com sucesso")),
    ))
}

#[instrument(skip(state, who), fields(user_id = who.id))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = User::find_by_id(&state.db, who.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(Json(ApiResponse::ok(user)))
}

#[instrument(skip(state, who, payload), fields(user_id = who.id))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    Json(payload): Json<UpdateMeRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let user = User::find_by_id(&state.db, who.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    if let Some(new_password) = payload.new_password.as_deref() {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "A password deve ter pelo menos {} caracteres",
                MIN_PASSWORD_LEN
            )));
        }
        let current = payload.current_password.clone().unwrap_or_default();
        if !password::verify_password_async(current, user.password_hash.clone()).await? {
            return Err(AppError::InvalidCredentials);
        }
        let hash = password::hash_password_async(new_password.to_string()).await?;
        User::update_password(&state.db, user.id, &hash).await?;
        info!("password changed");
    }

    if let Some(name) = payload.name.as_deref().map(str::trim) {
        if name.is_empty() {
            return Err(AppError::Validation("O nome não pode ficar vazio".into()));
        }
        User::update(&state.db, user.id, name, &user.email, user.role).await?;
    }

    // Re-issue so the token carries the new name.
    let user = User::find_by_id(&state.db, who.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    let body = issue(&state, &user)?;
    Ok(Json(ApiResponse::ok(body).with_message("Perfil atualizado")))
}

/// GET /api/utilizadores, admins only.
#[instrument(skip(state, admin), fields(user_id = admin.id))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    Ok(Json(ApiResponse::list(User::find_all(&state.db).await?)))
}
