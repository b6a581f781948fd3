use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::StoreError;

/// Daily nutrition targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Goals {
    pub calories: i32,
    pub protein: i32,
    pub carbohydrates: i32,
    pub fats: i32,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            calories: 2000,
            protein: 150,
            carbohydrates: 250,
            fats: 65,
        }
    }
}

#[async_trait]
pub trait GoalStore: Send + Sync {
    /// Returns the user's goals, inserting the defaults on first access.
    async fn get_or_create_goals(&self, user_id: Uuid) -> Result<Goals, StoreError>;
    async fn set_goals(&self, user_id: Uuid, goals: Goals) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgGoalStore {
    db: PgPool,
}

impl PgGoalStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GoalStore for PgGoalStore {
    async fn get_or_create_goals(&self, user_id: Uuid) -> Result<Goals, StoreError> {
        sqlx::query("INSERT INTO user_goals (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        let goals = sqlx::query_as::<_, Goals>(
            r#"
            SELECT calories, protein, carbohydrates, fats
              FROM user_goals
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(goals)
    }

    async fn set_goals(&self, user_id: Uuid, goals: Goals) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_goals (user_id, calories, protein, carbohydrates, fats)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
               SET calories = EXCLUDED.calories,
                   protein = EXCLUDED.protein,
                   carbohydrates = EXCLUDED.carbohydrates,
                   fats = EXCLUDED.fats,
                   updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(goals.calories)
        .bind(goals.protein)
        .bind(goals.carbohydrates)
        .bind(goals.fats)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
