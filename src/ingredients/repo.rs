use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientInput {
    #[serde(alias = "nome")]
    pub name: String,
}

impl Ingredient {
    pub async fn find_all(db: &PgPool) -> sqlx::Result<Vec<Ingredient>> {
        sqlx::query_as::<_, Ingredient>("SELECT id, name FROM ingredientes ORDER BY name")
            .fetch_all(db)
            .await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> sqlx::Result<Option<Ingredient>> {
        sqlx::query_as::<_, Ingredient>("SELECT id, name FROM ingredientes WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_name(db: &PgPool, name: &str) -> sqlx::Result<Option<Ingredient>> {
        sqlx::query_as::<_, Ingredient>("SELECT id, name FROM ingredientes WHERE name = $1")
            .bind(name)
            .fetch_optional(db)
            .await
    }

    /// Fails with a unique violation when the name already exists.
    pub async fn create(db: &PgPool, name: &str) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("INSERT INTO ingredientes (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(db)
            .await
    }

    pub async fn update(db: &PgPool, id: i64, name: &str) -> sqlx::Result<bool> {
        let res = sqlx::query("UPDATE ingredientes SET name = $1 WHERE id = $2")
            .bind(name)
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Also removes the ingredient from every recipe (cascade).
    pub async fn delete(db: &PgPool, id: i64) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM ingredientes WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn count(db: &PgPool) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ingredientes")
            .fetch_one(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn names_are_unique() {
        let Some(db) = test_pool().await else { return };
        let name = format!("Sal {}", rand::random::<u32>());

        let id = Ingredient::create(&db, &name).await.unwrap();
        assert_eq!(Ingredient::find_by_name(&db, &name).await.unwrap().unwrap().id, id);

        let err = Ingredient::create(&db, &name).await.unwrap_err();
        assert!(err.as_database_error().is_some_and(|e| e.is_unique_violation()));

        assert!(Ingredient::update(&db, id, &format!("{name} fino")).await.unwrap());
        assert!(Ingredient::delete(&db, id).await.unwrap());
        assert!(Ingredient::find_by_id(&db, id).await.unwrap().is_none());
    }
}
