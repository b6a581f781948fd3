use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;
use uuid::Uuid;

use crate::error::StoreError;

/// The four fixed meal slots, declared in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MealType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StoreError::Invariant(format!("unknown meal type {s:?}")))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MealShellRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_date: Date,
    pub meal_type: String,
}

/// Placeholder meal guaranteed per (user, date, meal type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealShell {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub meal_type: MealType,
}

impl TryFrom<MealShellRow> for MealShell {
    type Error = StoreError;

    fn try_from(r: MealShellRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            date: r.meal_date,
            meal_type: r.meal_type.parse()?,
        })
    }
}

/// One row of meal ⟕ logged food ⟕ cached food ⟕ nutrient.
/// Food columns are `None` for a meal without logged foods.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MealFoodRow {
    pub meal_id: Uuid,
    pub meal_date: Date,
    pub meal_type: String,
    pub fdc_id: Option<i64>,
    pub description: Option<String>,
    pub brand_name: Option<String>,
    pub quantity: Option<f64>,
    pub nutrient_name: Option<String>,
    pub value: Option<f64>,
}
