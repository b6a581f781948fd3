use serde::Serialize;
use sqlx::FromRow;

use crate::nutrients::NutrientValue;

#[derive(Debug, Clone, FromRow)]
pub struct FoodCacheRow {
    pub fdc_id: i64,
    pub description: String,
    pub brand_name: Option<String>,
    pub serving_size_unit: String,
    pub serving_size: f64,
    pub has_real_serving: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct FoodNutrientRow {
    pub nutrient_name: String,
    pub value: f64,
    pub unit_name: String,
}

/// A resolved food together with its per-100-unit macro rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedFood {
    pub fdc_id: i64,
    pub description: String,
    pub brand_name: Option<String>,
    pub serving_size_unit: String,
    pub serving_size: f64,
    pub has_real_serving: bool,
    pub nutrients: Vec<NutrientValue>,
}

impl CachedFood {
    pub fn from_rows(food: FoodCacheRow, nutrients: Vec<FoodNutrientRow>) -> Self {
        Self {
            fdc_id: food.fdc_id,
            description: food.description,
            brand_name: food.brand_name,
            serving_size_unit: food.serving_size_unit,
            serving_size: food.serving_size,
            has_real_serving: food.has_real_serving,
            nutrients: nutrients
                .into_iter()
                .map(|n| NutrientValue {
                    nutrient_name: n.nutrient_name,
                    value: n.value,
                    unit_name: n.unit_name,
                })
                .collect(),
        }
    }
}
