use std::collections::HashMap;

use time::Date;
use tracing::{debug, info};
use uuid::Uuid;

use super::dto::{DailyView, FoodLine, MacroTotals, MealView, DATE_FORMAT};
use super::repo::MealStore;
use super::repo_types::{MealFoodRow, MealShell, MealType};
use crate::error::{AppError, StoreError};
use crate::foods::dto::ResolvedFood;
use crate::foods::services::FoodResolver;
use crate::nutrients::Macro;

pub fn parse_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw, DATE_FORMAT)
        .map_err(|_| AppError::Validation(format!("Invalid date {raw:?}, expected YYYY-MM-DD")))
}

/// Reconciliation rounds before a missing shell is treated as a store fault.
/// A concurrent delete can remove a shell between our insert and read.
const SHELL_ATTEMPTS: usize = 3;

/// Makes sure the user has exactly one shell per meal type on `date` and
/// returns them in display order. Concurrent callers rely on the store's
/// uniqueness on (user, date, type); losing an insert race is not an error.
pub async fn ensure_shells(
    store: &dyn MealStore,
    user_id: Uuid,
    date: Date,
) -> Result<Vec<MealShell>, AppError> {
    for attempt in 1..=SHELL_ATTEMPTS {
        let mut shells = store.list_shells(user_id, date).await?;
        let missing: Vec<MealType> = MealType::ALL
            .into_iter()
            .filter(|t| !shells.iter().any(|s| s.meal_type == *t))
            .collect();

        if missing.is_empty() {
            shells.sort_by_key(|s| s.meal_type);
            if shells.len() != MealType::ALL.len() {
                return Err(StoreError::Invariant(format!(
                    "expected one shell per meal type for {user_id} on {date}, found {}",
                    shells.len()
                ))
                .into());
            }
            return Ok(shells);
        }

        debug!(%user_id, %date, attempt, missing = missing.len(), "creating meal shells");
        store.insert_shells(user_id, date, &missing).await?;
    }

    Err(StoreError::Invariant(format!(
        "meal shells for {user_id} on {date} kept disappearing"
    ))
    .into())
}

/// Folds joined rows into per-meal views. Each logged food gets its stored
/// per-100-unit values scaled by the logged quantity; meal totals are the sum
/// of their foods. Meals come back in display order, foods in row order.
pub fn aggregate(rows: Vec<MealFoodRow>) -> Result<Vec<MealView>, StoreError> {
    let mut meals: Vec<MealView> = Vec::new();
    let mut meal_idx: HashMap<Uuid, usize> = HashMap::new();
    let mut food_idx: HashMap<(Uuid, i64), usize> = HashMap::new();

    for row in rows {
        let mi = match meal_idx.get(&row.meal_id) {
            Some(i) => *i,
            None => {
                meals.push(MealView {
                    id: row.meal_id,
                    meal_type: row.meal_type.parse()?,
                    date: row.meal_date,
                    foods: Vec::new(),
                    totals: MacroTotals::default(),
                });
                meal_idx.insert(row.meal_id, meals.len() - 1);
                meals.len() - 1
            }
        };

        let Some(fdc_id) = row.fdc_id else {
            continue;
        };
        let quantity = row.quantity.unwrap_or(0.0);
        let meal = &mut meals[mi];
        let fi = *food_idx.entry((row.meal_id, fdc_id)).or_insert_with(|| {
            meal.foods.push(FoodLine {
                fdc_id,
                description: row.description.clone().unwrap_or_default(),
                brand: row.brand_name.clone(),
                quantity,
                macros: MacroTotals::default(),
            });
            meal.foods.len() - 1
        });

        if let (Some(name), Some(value)) = (row.nutrient_name.as_deref(), row.value) {
            if let Some(m) = Macro::from_nutrient_name(name) {
                meal.foods[fi].macros.add(m, scale(value, quantity));
            }
        }
    }

    for meal in &mut meals {
        let mut totals = MacroTotals::default();
        for food in &meal.foods {
            totals += food.macros;
        }
        meal.totals = totals;
    }
    meals.sort_by_key(|m| m.meal_type);
    Ok(meals)
}

/// Per-100-unit value to the amount in `quantity` units.
pub fn scale(per_100: f64, quantity: f64) -> f64 {
    per_100 / 100.0 * quantity
}

pub async fn compute_daily_view(
    store: &dyn MealStore,
    user_id: Uuid,
    date: Date,
) -> Result<DailyView, AppError> {
    for attempt in 1..=SHELL_ATTEMPTS {
        ensure_shells(store, user_id, date).await?;
        let meals = aggregate(store.day_rows(user_id, date).await?)?;
        if meals.len() != MealType::ALL.len() {
            debug!(%user_id, %date, attempt, found = meals.len(), "shell removed mid-read");
            continue;
        }

        let mut daily_totals = MacroTotals::default();
        for meal in &meals {
            daily_totals += meal.totals;
        }
        return Ok(DailyView {
            date,
            meals,
            daily_totals,
        });
    }

    Err(StoreError::Invariant(format!(
        "daily view for {user_id} on {date} never saw all meal shells"
    ))
    .into())
}

pub async fn get_meal(
    store: &dyn MealStore,
    user_id: Uuid,
    meal_id: Uuid,
) -> Result<MealView, AppError> {
    let rows = store.meal_rows(user_id, meal_id).await?;
    aggregate(rows)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Meal not found".into()))
}

async fn owned_meal(
    store: &dyn MealStore,
    user_id: Uuid,
    meal_id: Uuid,
    action: &str,
) -> Result<MealShell, AppError> {
    store
        .find_meal(user_id, meal_id)
        .await?
        .ok_or_else(|| AppError::Forbidden(format!("You don't have permission to {action} this meal")))
}

/// Logs `quantity` grams of a food into a meal. Repeated logs of the same
/// food accumulate. Returns the resolved food and the new logged total.
pub async fn log_food(
    store: &dyn MealStore,
    resolver: &FoodResolver,
    user_id: Uuid,
    meal_id: Uuid,
    fdc_id: i64,
    quantity: f64,
) -> Result<(ResolvedFood, f64), AppError> {
    if fdc_id <= 0 {
        return Err(AppError::Validation("fdc_id must be a positive number".into()));
    }
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(AppError::Validation("Quantity must be a positive number".into()));
    }

    owned_meal(store, user_id, meal_id, "add food to").await?;
    let food = resolver.resolve(fdc_id).await?;
    let total = store
        .add_food(user_id, meal_id, fdc_id, quantity)
        .await?
        .ok_or_else(|| AppError::Forbidden("You don't have permission to add food to this meal".into()))?;

    info!(%user_id, %meal_id, fdc_id, quantity, total, "food logged");
    Ok((food, total))
}

pub async fn delete_food(
    store: &dyn MealStore,
    user_id: Uuid,
    meal_id: Uuid,
    fdc_id: i64,
) -> Result<(), AppError> {
    owned_meal(store, user_id, meal_id, "modify").await?;
    if !store.remove_food(user_id, meal_id, fdc_id).await? {
        return Err(AppError::NotFound("Food not found in this meal".into()));
    }
    info!(%user_id, %meal_id, fdc_id, "food removed from meal");
    Ok(())
}

pub async fn delete_meal(
    store: &dyn MealStore,
    user_id: Uuid,
    meal_id: Uuid,
) -> Result<MealShell, AppError> {
    let shell = store.delete_meal(user_id, meal_id).await?.ok_or_else(|| {
        AppError::NotFound("Meal not found or you don't have permission to delete it".into())
    })?;
    info!(%user_id, %meal_id, meal_type = %shell.meal_type, "meal deleted");
    Ok(shell)
}
