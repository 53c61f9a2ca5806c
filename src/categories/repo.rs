use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub recipe_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(default, alias = "descricao")]
    pub description: Option<String>,
}

impl CategoryInput {
    /// Trimmed copy; an empty description becomes `None`.
    pub fn normalized(&self) -> Option<CategoryInput> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        Some(CategoryInput { name: name.to_string(), description })
    }
}

impl Category {
    pub async fn find_all(db: &PgPool) -> sqlx::Result<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name, c.description, COUNT(r.id) AS recipe_count
              FROM categorias c
              LEFT JOIN receitas r ON r.category_id = c.id
             GROUP BY c.id
             ORDER BY c.name
            "#,
        )
        .fetch_all(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> sqlx::Result<Option<Category>> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name, c.description,
                   (SELECT COUNT(*) FROM receitas r WHERE r.category_id = c.id) AS recipe_count
              FROM categorias c
             WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn create(db: &PgPool, input: &CategoryInput) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO categorias (name, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(db)
        .await
    }

    pub async fn update(db: &PgPool, id: i64, input: &CategoryInput) -> sqlx::Result<bool> {
        let res = sqlx::query("UPDATE categorias SET name = $1, description = $2 WHERE id = $3")
            .bind(&input.name)
            .bind(&input.description)
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Fails with a foreign-key violation while recipes still reference it.
    pub async fn delete(db: &PgPool, id: i64) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM categorias WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn count(db: &PgPool) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categorias")
            .fetch_one(db)
            .await
    }
}
