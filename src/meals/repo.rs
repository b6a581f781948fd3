use async_trait::async_trait;
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

use super::repo_types::{MealFoodRow, MealShell, MealShellRow, MealType};
use crate::error::StoreError;

/// Persistence for meal shells and the food quantities logged into them.
/// Every call is scoped by the owning user.
#[async_trait]
pub trait MealStore: Send + Sync {
    async fn list_shells(&self, user_id: Uuid, date: Date) -> Result<Vec<MealShell>, StoreError>;

    /// Inserts the given shells; ones that already exist are skipped.
    async fn insert_shells(
        &self,
        user_id: Uuid,
        date: Date,
        types: &[MealType],
    ) -> Result<(), StoreError>;

    async fn find_meal(&self, user_id: Uuid, meal_id: Uuid)
        -> Result<Option<MealShell>, StoreError>;

    /// Joined rows for every shell of the day, read as one snapshot.
    async fn day_rows(&self, user_id: Uuid, date: Date) -> Result<Vec<MealFoodRow>, StoreError>;

    async fn meal_rows(&self, user_id: Uuid, meal_id: Uuid)
        -> Result<Vec<MealFoodRow>, StoreError>;

    /// Adds `quantity` to the logged amount and returns the new total,
    /// or `None` when the meal is not the user's.
    async fn add_food(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
        fdc_id: i64,
        quantity: f64,
    ) -> Result<Option<f64>, StoreError>;

    async fn remove_food(&self, user_id: Uuid, meal_id: Uuid, fdc_id: i64)
        -> Result<bool, StoreError>;

    async fn delete_meal(&self, user_id: Uuid, meal_id: Uuid)
        -> Result<Option<MealShell>, StoreError>;
}

#[derive(Clone)]
pub struct PgMealStore {
    db: PgPool,
}

impl PgMealStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const JOINED_COLUMNS: &str = r#"
    SELECT m.id AS meal_id, m.meal_date, m.meal_type,
           f.fdc_id, f.description, f.brand_name,
           mf.quantity, fn.nutrient_name, fn.value
      FROM meals m
      LEFT JOIN meal_foods mf ON mf.meal_id = m.id
      LEFT JOIN food_cache f ON f.fdc_id = mf.food_id
      LEFT JOIN food_nutrients fn ON fn.food_id = f.fdc_id
"#;

const JOINED_ORDER: &str = r#"
     ORDER BY CASE m.meal_type
                WHEN 'breakfast' THEN 1
                WHEN 'lunch' THEN 2
                WHEN 'dinner' THEN 3
                WHEN 'snack' THEN 4
              END,
              m.id, mf.logged_at, f.fdc_id
"#;

#[async_trait]
impl MealStore for PgMealStore {
    async fn list_shells(&self, user_id: Uuid, date: Date) -> Result<Vec<MealShell>, StoreError> {
        let rows = sqlx::query_as::<_, MealShellRow>(
            r#"
            SELECT id, user_id, meal_date, meal_type
              FROM meals
             WHERE user_id = $1 AND meal_date = $2
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(MealShell::try_from).collect()
    }

    async fn insert_shells(
        &self,
        user_id: Uuid,
        date: Date,
        types: &[MealType],
    ) -> Result<(), StoreError> {
        let names: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO meals (user_id, meal_date, meal_type)
            SELECT $1, $2, t FROM UNNEST($3::text[]) AS t
            ON CONFLICT (user_id, meal_date, meal_type) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(date)
        .bind(names)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_meal(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
    ) -> Result<Option<MealShell>, StoreError> {
        let row = sqlx::query_as::<_, MealShellRow>(
            r#"
            SELECT id, user_id, meal_date, meal_type
              FROM meals
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(meal_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(MealShell::try_from).transpose()
    }

    async fn day_rows(&self, user_id: Uuid, date: Date) -> Result<Vec<MealFoodRow>, StoreError> {
        // a single statement sees a single snapshot
        let sql = format!("{JOINED_COLUMNS} WHERE m.user_id = $1 AND m.meal_date = $2 {JOINED_ORDER}");
        let rows = sqlx::query_as::<_, MealFoodRow>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn meal_rows(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
    ) -> Result<Vec<MealFoodRow>, StoreError> {
        let sql = format!("{JOINED_COLUMNS} WHERE m.id = $1 AND m.user_id = $2 {JOINED_ORDER}");
        let rows = sqlx::query_as::<_, MealFoodRow>(&sql)
            .bind(meal_id)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn add_food(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
        fdc_id: i64,
        quantity: f64,
    ) -> Result<Option<f64>, StoreError> {
        let total = sqlx::query_scalar::<_, f64>(
            r#"
            INSERT INTO meal_foods (meal_id, food_id, quantity)
            SELECT m.id, $3, $4
              FROM meals m
             WHERE m.id = $1 AND m.user_id = $2
            ON CONFLICT (meal_id, food_id)
            DO UPDATE SET quantity = meal_foods.quantity + EXCLUDED.quantity
            RETURNING quantity
            "#,
        )
        .bind(meal_id)
        .bind(user_id)
        .bind(fdc_id)
        .bind(quantity)
        .fetch_optional(&self.db)
        .await?;
        Ok(total)
    }

    async fn remove_food(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
        fdc_id: i64,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            DELETE FROM meal_foods mf
             USING meals m
             WHERE mf.meal_id = m.id
               AND m.id = $1 AND m.user_id = $2
               AND mf.food_id = $3
            "#,
        )
        .bind(meal_id)
        .bind(user_id)
        .bind(fdc_id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_meal(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
    ) -> Result<Option<MealShell>, StoreError> {
        let row = sqlx::query_as::<_, MealShellRow>(
            r#"
            DELETE FROM meals
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, meal_date, meal_type
            "#,
        )
        .bind(meal_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(MealShell::try_from).transpose()
    }
}
