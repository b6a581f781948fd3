use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::repo_types::{CachedFood, FoodCacheRow, FoodNutrientRow};
use crate::error::StoreError;

/// System of record for foods that were already resolved upstream.
#[async_trait]
pub trait FoodCacheStore: Send + Sync {
    async fn get(&self, fdc_id: i64) -> Result<Option<CachedFood>, StoreError>;

    /// Writes the entry and its nutrient rows as one unit. An existing entry
    /// is left untouched and nutrient rows are never duplicated.
    async fn put(&self, food: &CachedFood) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgFoodCache {
    db: PgPool,
}

impl PgFoodCache {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FoodCacheStore for PgFoodCache {
    async fn get(&self, fdc_id: i64) -> Result<Option<CachedFood>, StoreError> {
        // entry and nutrients from one snapshot
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        let food = sqlx::query_as::<_, FoodCacheRow>(
            r#"
            SELECT fdc_id, description, brand_name, serving_size_unit, serving_size, has_real_serving
              FROM food_cache
             WHERE fdc_id = $1
            "#,
        )
        .bind(fdc_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(food) = food else {
            tx.commit().await?;
            return Ok(None);
        };

        let nutrients = sqlx::query_as::<_, FoodNutrientRow>(
            r#"
            SELECT nutrient_name, value, unit_name
              FROM food_nutrients
             WHERE food_id = $1
             ORDER BY nutrient_name
            "#,
        )
        .bind(fdc_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(CachedFood::from_rows(food, nutrients)))
    }

    async fn put(&self, food: &CachedFood) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;
        insert_food_tx(&mut tx, food).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn insert_food_tx(
    tx: &mut Transaction<'_, Postgres>,
    food: &CachedFood,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO food_cache (fdc_id, description, brand_name, serving_size_unit, serving_size, has_real_serving)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (fdc_id) DO NOTHING
        "#,
    )
    .bind(food.fdc_id)
    .bind(&food.description)
    .bind(&food.brand_name)
    .bind(&food.serving_size_unit)
    .bind(food.serving_size)
    .bind(food.has_real_serving)
    .execute(&mut **tx)
    .await?;

    for n in &food.nutrients {
        sqlx::query(
            r#"
            INSERT INTO food_nutrients (food_id, nutrient_name, value, unit_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (food_id, nutrient_name) DO NOTHING
            "#,
        )
        .bind(food.fdc_id)
        .bind(&n.nutrient_name)
        .bind(n.value)
        .bind(&n.unit_name)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
