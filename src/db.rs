use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::auth::{password, repo_types::{NewUser, Role, User}};
use crate::config::{AdminSeed, AppConfig};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(config.database.clone())
        .await
        .context("connect to database")
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    Ok(())
}

/// Creates the configured admin account, or resets its password and role.
pub async fn ensure_admin(db: &PgPool, seed: &AdminSeed) -> anyhow::Result<()> {
    let email = seed.email.trim().to_lowercase();
    let hash = password::hash_password_async(seed.password.clone()).await?;

    match User::find_by_email(db, &email).await? {
        Some(user) => {
            User::update_password(db, user.id, &hash).await?;
            if user.role != Role::Admin {
                warn!(user_id = user.id, "promoting existing account to admin");
                User::update(db, user.id, &user.name, &user.email, Role::Admin).await?;
            }
            info!(user_id = user.id, "admin password reset");
        }
        None => {
            let id = User::create(
                db,
                &NewUser {
                    name: "Administrador",
                    email: &email,
                    password_hash: &hash,
                    role: Role::Admin,
                },
            )
            .await?;
            info!(user_id = id, "admin account created");
        }
    }
    Ok(())
}

/// Pool against `TEST_DATABASE_URL` with migrations applied, or `None` when unset.
#[cfg(test)]
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let db = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    migrate(&db).await.expect("migrations");
    Some(db)
}
