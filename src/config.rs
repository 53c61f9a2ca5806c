use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

pub const DEFAULT_EXTERNAL_API_URL: &str = "https://www.themealdb.com/api/json/v1/1";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PgConnectOptions,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    pub public_dir: PathBuf,
    pub external_api_url: String,
    pub admin: Option<AdminSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "receitas".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "receitas-web".into()),
            ttl_minutes: parse_var("JWT_TTL_MINUTES").unwrap_or(60 * 24),
        };

        let admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminSeed { email, password })
            }
            _ => None,
        };

        Ok(Self {
            database: database_from_env()?,
            max_connections: parse_var("DB_MAX_CONNECTIONS").unwrap_or(10),
            jwt,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("PORT").unwrap_or(3000),
            public_dir: std::env::var("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public")),
            external_api_url: std::env::var("EXTERNAL_API_URL")
                .unwrap_or_else(|_| DEFAULT_EXTERNAL_API_URL.into()),
            admin,
        })
    }

    /// Directory recipe images are written to.
    pub fn upload_dir(&self) -> PathBuf {
        self.public_dir.join("uploads").join("receitas")
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// `DATABASE_URL` wins; otherwise the connection is built from the `DB_*` parts.
fn database_from_env() -> anyhow::Result<PgConnectOptions> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return url
            .parse::<PgConnectOptions>()
            .context("DATABASE_URL is not a valid postgres URL");
    }
    let var = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.into());
    Ok(database_from_parts(
        &var("DB_HOST", "localhost"),
        parse_var("DB_PORT").unwrap_or(5432),
        &var("DB_USER", "postgres"),
        &var("DB_PASSWORD", ""),
        &var("DB_NAME", "gestao_receitas"),
    ))
}

/// Parts are set one by one, so credentials need no URL escaping.
fn database_from_parts(host: &str, port: u16, user: &str, password: &str, name: &str) -> PgConnectOptions {
    let options = PgConnectOptions::new_without_pgpass()
        .host(host)
        .port(port)
        .username(user)
        .database(name);
    if password.is_empty() {
        options
    } else {
        options.password(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_characters_in_credentials_keep_host_and_database() {
        let options = database_from_parts("db", 6543, "app@corp", "p@ss:w/rd#1", "receitas");
        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "app@corp");
        assert_eq!(options.get_database(), Some("receitas"));

        let options = database_from_parts("localhost", 5432, "postgres", "", "gestao_receitas");
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_database(), Some("gestao_receitas"));
    }

    #[test]
    fn upload_dir_is_below_public_dir() {
        let cfg = AppConfig {
            database: database_from_parts("localhost", 5432, "postgres", "", "receitas"),
            max_connections: 1,
            jwt: JwtConfig {
                secret: "s".into(),
                issuer: "i".into(),
                audience: "a".into(),
                ttl_minutes: 1,
            },
            host: "127.0.0.1".into(),
            port: 0,
            public_dir: PathBuf::from("/srv/public"),
            external_api_url: DEFAULT_EXTERNAL_API_URL.into(),
            admin: None,
        };
        assert_eq!(cfg.upload_dir(), PathBuf::from("/srv/public/uploads/receitas"));
    }
}
