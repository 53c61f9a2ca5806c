use sqlx::PgPool;

use crate::auth::repo_types::{NewUser, Role, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at";

impl User {
    pub async fn find_all(db: &PgPool) -> sqlx::Result<Vec<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM utilizadores ORDER BY created_at DESC"
        ))
        .fetch_all(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM utilizadores WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM utilizadores WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    /// Insert a user whose password is already hashed; returns the new id.
    pub async fn create(db: &PgPool, new: &NewUser<'_>) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO utilizadores (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(db)
        .await
    }

    pub async fn update(
        db: &PgPool,
        id: i64,
        name: &str,
        email: &str,
        role: Role,
    ) -> sqlx::Result<bool> {
        let res = sqlx::query(
            "UPDATE utilizadores SET name = $1, email = $2, role = $3 WHERE id = $4",
        )
        .bind(name)
        .bind(email)
        .bind(role.as_str())
        .bind(id)
        .execute(db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn update_password(db: &PgPool, id: i64, password_hash: &str) -> sqlx::Result<bool> {
        let res = sqlx::query("UPDATE utilizadores SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn delete(db: &PgPool, id: i64) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM utilizadores WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn count(db: &PgPool) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM utilizadores")
            .fetch_one(db)
            .await
    }
}
