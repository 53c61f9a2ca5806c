use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::recipes::repo_types::{
    Difficulty, IngredientQuantity, Recipe, RecipeFilter, RecipeIngredient, RecipeInput,
};

const RECIPE_SELECT: &str = r#"
    SELECT r.id, r.name, r.author, r.preparation, r.prep_time_minutes, r.cost, r.servings,
           r.image, r.category_id, c.name AS category_name, r.difficulty_id,
           d.level AS difficulty_level, r.user_id, u.name AS owner_name, r.created_at
      FROM receitas r
      JOIN categorias c ON c.id = r.category_id
      JOIN dificuldades d ON d.id = r.difficulty_id
      LEFT JOIN utilizadores u ON u.id = r.user_id"#;

const RECIPE_ORDER: &str = " ORDER BY r.created_at DESC, r.id DESC";

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Each present filter adds one AND clause; absent filters add nothing.
pub(crate) fn search_query(filter: &RecipeFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(RECIPE_SELECT);
    let mut sep = " WHERE ";

    if let Some(term) = filter.term() {
        let pattern = format!("%{}%", escape_like(term));
        qb.push(sep)
            .push("(r.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.author ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.preparation ILIKE ")
            .push_bind(pattern)
            .push(")");
        sep = " AND ";
    }
    if let Some(category_id) = filter.category_id {
        qb.push(sep).push("r.category_id = ").push_bind(category_id);
        sep = " AND ";
    }
    if let Some(difficulty_id) = filter.difficulty_id {
        qb.push(sep).push("r.difficulty_id = ").push_bind(difficulty_id);
    }

    qb.push(RECIPE_ORDER);
    qb
}

impl Recipe {
    pub async fn find_all(db: &PgPool) -> sqlx::Result<Vec<Recipe>> {
        Self::search(db, &RecipeFilter::default()).await
    }

    pub async fn search(db: &PgPool, filter: &RecipeFilter) -> sqlx::Result<Vec<Recipe>> {
        let mut qb = search_query(filter);
        qb.build_query_as::<Recipe>().fetch_all(db).await
    }

    pub async fn find_by_category(db: &PgPool, category_id: i64) -> sqlx::Result<Vec<Recipe>> {
        let filter = RecipeFilter { category_id: Some(category_id), ..Default::default() };
        Self::search(db, &filter).await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> sqlx::Result<Option<Recipe>> {
        sqlx::query_as::<_, Recipe>(&format!("{RECIPE_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn ingredients(db: &PgPool, recipe_id: i64) -> sqlx::Result<Vec<RecipeIngredient>> {
        sqlx::query_as::<_, RecipeIngredient>(
            r#"
            SELECT i.id, i.name, ri.quantity
              FROM receita_ingredientes ri
              JOIN ingredientes i ON i.id = ri.ingredient_id
             WHERE ri.recipe_id = $1
             ORDER BY i.name
            "#,
        )
        .bind(recipe_id)
        .fetch_all(db)
        .await
    }

    /// Inserts the recipe and its ingredient links in one transaction.
    pub async fn create(db: &PgPool, input: &RecipeInput, user_id: i64) -> sqlx::Result<i64> {
        let mut tx = db.begin().await?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO receitas (name, author, preparation, prep_time_minutes, cost, servings,
                                  image, category_id, difficulty_id, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&input.name)
        .bind(&input.author)
        .bind(&input.preparation)
        .bind(input.prep_time_minutes)
        .bind(input.cost)
        .bind(input.servings)
        .bind(&input.image)
        .bind(input.category_id)
        .bind(input.difficulty_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        for item in input.ingredients.iter().flatten() {
            add_ingredient(&mut tx, id, item).await?;
        }
        tx.commit().await?;
        Ok(id)
    }

    /// A `None` image keeps the stored one; `Some` ingredients replace all links.
    pub async fn update(db: &PgPool, id: i64, input: &RecipeInput) -> sqlx::Result<bool> {
        let mut tx = db.begin().await?;
        let res = sqlx::query(
            r#"
            UPDATE receitas
               SET name = $1, author = $2, preparation = $3, prep_time_minutes = $4,
                   cost = $5, servings = $6, image = COALESCE($7, image),
                   category_id = $8, difficulty_id = $9
             WHERE id = $10
            "#,
        )
        .bind(&input.name)
        .bind(&input.author)
        .bind(&input.preparation)
        .bind(input.prep_time_minutes)
        .bind(input.cost)
        .bind(input.servings)
        .bind(&input.image)
        .bind(input.category_id)
        .bind(input.difficulty_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        if let Some(items) = &input.ingredients {
            replace_ingredients(&mut tx, id, items).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    pub async fn delete(db: &PgPool, id: i64) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM receitas WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Whether any recipe other than `except_id` points at this image path.
    pub async fn image_in_use(db: &PgPool, image: &str, except_id: i64) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM receitas WHERE image = $1 AND id <> $2)",
        )
        .bind(image)
        .bind(except_id)
        .fetch_one(db)
        .await
    }

    pub async fn count(db: &PgPool) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM receitas")
            .fetch_one(db)
            .await
    }

    pub async fn recent(db: &PgPool, limit: i64) -> sqlx::Result<Vec<Recipe>> {
        sqlx::query_as::<_, Recipe>(&format!("{RECIPE_SELECT}{RECIPE_ORDER} LIMIT $1"))
            .bind(limit)
            .fetch_all(db)
            .await
    }
}

pub async fn add_ingredient(
    conn: &mut PgConnection,
    recipe_id: i64,
    item: &IngredientQuantity,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO receita_ingredientes (recipe_id, ingredient_id, quantity)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(recipe_id)
    .bind(item.ingredient_id)
    .bind(&item.quantity)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn replace_ingredients(
    conn: &mut PgConnection,
    recipe_id: i64,
    items: &[IngredientQuantity],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM receita_ingredientes WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;
    for item in items {
        add_ingredient(conn, recipe_id, item).await?;
    }
    Ok(())
}

impl Difficulty {
    pub async fn find_all(db: &PgPool) -> sqlx::Result<Vec<Difficulty>> {
        sqlx::query_as::<_, Difficulty>(
            "SELECT id, level, sort_order FROM dificuldades ORDER BY sort_order",
        )
        .fetch_all(db)
        .await
    }
}
