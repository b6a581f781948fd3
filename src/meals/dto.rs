use std::ops::AddAssign;

use serde::{Deserialize, Serialize, Serializer};
use time::{format_description::FormatItem, macros::format_description, Date};
use uuid::Uuid;

use super::repo_types::MealType;
use crate::foods::dto::ResolvedFood;
use crate::nutrients::Macro;

/// Calendar dates travel as `YYYY-MM-DD`.
pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

fn iso_date<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
    let text = date.format(DATE_FORMAT).map_err(serde::ser::Error::custom)?;
    s.serialize_str(&text)
}

/// Macro amounts for a logged quantity (not per 100 units).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbohydrates: f64,
    pub fats: f64,
}

impl MacroTotals {
    pub fn add(&mut self, m: Macro, amount: f64) {
        match m {
            Macro::Energy => self.calories += amount,
            Macro::Protein => self.protein += amount,
            Macro::Carbohydrate => self.carbohydrates += amount,
            Macro::Fat => self.fats += amount,
        }
    }
}

impl AddAssign for MacroTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.calories += rhs.calories;
        self.protein += rhs.protein;
        self.carbohydrates += rhs.carbohydrates;
        self.fats += rhs.fats;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodLine {
    pub fdc_id: i64,
    pub description: String,
    pub brand: Option<String>,
    pub quantity: f64,
    #[serde(flatten)]
    pub macros: MacroTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub meal_type: MealType,
    #[serde(serialize_with = "iso_date")]
    pub date: Date,
    pub foods: Vec<FoodLine>,
    pub totals: MacroTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyView {
    #[serde(serialize_with = "iso_date")]
    pub date: Date,
    pub meals: Vec<MealView>,
    pub daily_totals: MacroTotals,
}

#[derive(Debug, Deserialize)]
pub struct LogFoodRequest {
    pub meal_id: Uuid,
    pub fdc_id: i64,
    pub quantity: f64,
}

#[derive(Debug, Serialize)]
pub struct LogFoodResponse {
    pub message: String,
    pub food: ResolvedFood,
    pub quantity: f64,
}

#[derive(Debug, Serialize)]
pub struct DeleteFoodResponse {
    pub message: String,
    pub deleted_food_id: i64,
}

#[derive(Debug, Serialize)]
pub struct DeleteMealResponse {
    pub message: String,
    pub deleted_meal_type: MealType,
    #[serde(serialize_with = "iso_date")]
    pub deleted_meal_date: Date,
}
