use serde::{Deserialize, Serialize};

use crate::auth::claims::Identity;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "nome")]
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Profile update; changing the password requires the current one.
#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Identity,
}
