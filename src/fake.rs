//! In-memory stand-ins for the Postgres stores and the USDA client.
//! They enforce the same keys the schema does: one shell per
//! (user, date, type), one entry per (meal, food), one nutrient per
//! (food, name).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use time::Date;
use uuid::Uuid;

use crate::error::StoreError;
use crate::foods::repo::FoodCacheStore;
use crate::foods::repo_types::CachedFood;
use crate::goals::repo::{GoalStore, Goals};
use crate::meals::repo::MealStore;
use crate::meals::repo_types::{MealFoodRow, MealShell, MealType};
use crate::nutrients::{Macro, RawNutrient};
use crate::usda::{FoodRecord, LookupError, NutritionSource};

#[derive(Debug)]
struct Entry {
    meal_id: Uuid,
    fdc_id: i64,
    quantity: f64,
}

#[derive(Default)]
struct Inner {
    foods: HashMap<i64, CachedFood>,
    shells: Vec<MealShell>,
    entries: Vec<Entry>,
    goals: HashMap<Uuid, Goals>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut guard = self.inner.lock().expect("memory store poisoned");
        f(&mut guard)
    }
}

#[async_trait]
impl FoodCacheStore for MemoryStore {
    async fn get(&self, fdc_id: i64) -> Result<Option<CachedFood>, StoreError> {
        Ok(self.with(|s| s.foods.get(&fdc_id).cloned()))
    }

    async fn put(&self, food: &CachedFood) -> Result<(), StoreError> {
        self.with(|s| {
            s.foods.entry(food.fdc_id).or_insert_with(|| food.clone());
        });
        Ok(())
    }
}

impl Inner {
    fn rows_for(&self, shells: Vec<MealShell>) -> Vec<MealFoodRow> {
        let mut rows = Vec::new();
        for shell in shells {
            let base = MealFoodRow {
                meal_id: shell.id,
                meal_date: shell.date,
                meal_type: shell.meal_type.as_str().to_string(),
                fdc_id: None,
                description: None,
                brand_name: None,
                quantity: None,
                nutrient_name: None,
                value: None,
            };
            let mut logged = self.entries.iter().filter(|e| e.meal_id == shell.id).peekable();
            if logged.peek().is_none() {
                rows.push(base);
                continue;
            }
            for entry in logged {
                let Some(food) = self.foods.get(&entry.fdc_id) else {
                    rows.push(MealFoodRow {
                        quantity: Some(entry.quantity),
                        ..base.clone()
                    });
                    continue;
                };
                let with_food = MealFoodRow {
                    fdc_id: Some(food.fdc_id),
                    description: Some(food.description.clone()),
                    brand_name: food.brand_name.clone(),
                    quantity: Some(entry.quantity),
                    ..base.clone()
                };
                if food.nutrients.is_empty() {
                    rows.push(with_food);
                    continue;
                }
                for n in &food.nutrients {
                    rows.push(MealFoodRow {
                        nutrient_name: Some(n.nutrient_name.clone()),
                        value: Some(n.value),
                        ..with_food.clone()
                    });
                }
            }
        }
        rows
    }

    fn owns(&self, user_id: Uuid, meal_id: Uuid) -> bool {
        self.shells.iter().any(|s| s.id == meal_id && s.user_id == user_id)
    }
}

#[async_trait]
impl MealStore for MemoryStore {
    async fn list_shells(&self, user_id: Uuid, date: Date) -> Result<Vec<MealShell>, StoreError> {
        Ok(self.with(|s| {
            s.shells
                .iter()
                .filter(|m| m.user_id == user_id && m.date == date)
                .cloned()
                .collect()
        }))
    }

    async fn insert_shells(
        &self,
        user_id: Uuid,
        date: Date,
        types: &[MealType],
    ) -> Result<(), StoreError> {
        // widen the race window between list and insert
        tokio::task::yield_now().await;
        self.with(|s| {
            for t in types {
                let exists = s
                    .shells
                    .iter()
                    .any(|m| m.user_id == user_id && m.date == date && m.meal_type == *t);
                if !exists {
                    s.shells.push(MealShell {
                        id: Uuid::new_v4(),
                        user_id,
                        date,
                        meal_type: *t,
                    });
                }
            }
        });
        Ok(())
    }

    async fn find_meal(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
    ) -> Result<Option<MealShell>, StoreError> {
        Ok(self.with(|s| {
            s.shells
                .iter()
                .find(|m| m.id == meal_id && m.user_id == user_id)
                .cloned()
        }))
    }

    async fn day_rows(&self, user_id: Uuid, date: Date) -> Result<Vec<MealFoodRow>, StoreError> {
        Ok(self.with(|s| {
            let mut shells: Vec<MealShell> = s
                .shells
                .iter()
                .filter(|m| m.user_id == user_id && m.date == date)
                .cloned()
                .collect();
            shells.sort_by_key(|m| m.meal_type);
            s.rows_for(shells)
        }))
    }

    async fn meal_rows(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
    ) -> Result<Vec<MealFoodRow>, StoreError> {
        Ok(self.with(|s| {
            let shells = s
                .shells
                .iter()
                .filter(|m| m.id == meal_id && m.user_id == user_id)
                .cloned()
                .collect();
            s.rows_for(shells)
        }))
    }

    async fn add_food(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
        fdc_id: i64,
        quantity: f64,
    ) -> Result<Option<f64>, StoreError> {
        Ok(self.with(|s| {
            if !s.owns(user_id, meal_id) {
                return None;
            }
            if let Some(e) = s
                .entries
                .iter_mut()
                .find(|e| e.meal_id == meal_id && e.fdc_id == fdc_id)
            {
                e.quantity += quantity;
                return Some(e.quantity);
            }
            s.entries.push(Entry {
                meal_id,
                fdc_id,
                quantity,
            });
            Some(quantity)
        }))
    }

    async fn remove_food(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
        fdc_id: i64,
    ) -> Result<bool, StoreError> {
        Ok(self.with(|s| {
            if !s.owns(user_id, meal_id) {
                return false;
            }
            let before = s.entries.len();
            s.entries
                .retain(|e| !(e.meal_id == meal_id && e.fdc_id == fdc_id));
            s.entries.len() != before
        }))
    }

    async fn delete_meal(
        &self,
        user_id: Uuid,
        meal_id: Uuid,
    ) -> Result<Option<MealShell>, StoreError> {
        Ok(self.with(|s| {
            let pos = s
                .shells
                .iter()
                .position(|m| m.id == meal_id && m.user_id == user_id)?;
            s.entries.retain(|e| e.meal_id != meal_id);
            Some(s.shells.remove(pos))
        }))
    }
}

#[async_trait]
impl GoalStore for MemoryStore {
    async fn get_or_create_goals(&self, user_id: Uuid) -> Result<Goals, StoreError> {
        Ok(self.with(|s| *s.goals.entry(user_id).or_default()))
    }

    async fn set_goals(&self, user_id: Uuid, goals: Goals) -> Result<(), StoreError> {
        self.with(|s| {
            s.goals.insert(user_id, goals);
        });
        Ok(())
    }
}

/// Scripted upstream that counts lookups.
#[derive(Default)]
pub struct FakeNutritionSource {
    foods: HashMap<i64, FoodRecord>,
    fail: bool,
    delay: Option<Duration>,
    lookups: AtomicUsize,
}

impl FakeNutritionSource {
    pub fn with(records: Vec<FoodRecord>) -> Self {
        Self {
            foods: records.into_iter().map(|r| (r.fdc_id, r)).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NutritionSource for FakeNutritionSource {
    async fn lookup(&self, fdc_id: i64) -> Result<FoodRecord, LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.fail {
            return Err(LookupError::Transient("HTTP 502: bad gateway".into()));
        }
        self.foods.get(&fdc_id).cloned().ok_or(LookupError::NotFound)
    }

    async fn search(&self, query: &str) -> Result<Vec<FoodRecord>, LookupError> {
        if self.fail {
            return Err(LookupError::Transient("HTTP 502: bad gateway".into()));
        }
        let q = query.to_lowercase();
        Ok(self
            .foods
            .values()
            .filter(|f| f.description.to_lowercase().contains(&q))
            .cloned()
            .collect())
    }
}

/// Upstream record with all four macros; `energy` is kcal per 100 g.
pub fn sample_record(fdc_id: i64, energy: f64) -> FoodRecord {
    let raw = |m: Macro, value: f64, unit: &str| RawNutrient {
        id: m.nutrient_id(),
        name: m.nutrient_name().to_string(),
        value,
        unit_name: unit.to_string(),
    };
    FoodRecord {
        fdc_id,
        description: format!("Sample food {fdc_id}"),
        brand_name: None,
        serving_size_unit: Some("g".into()),
        serving_size: Some(100.0),
        nutrients: vec![
            raw(Macro::Energy, energy, "kcal"),
            raw(Macro::Protein, 1.0, "g"),
            raw(Macro::Carbohydrate, 2.0, "g"),
            raw(Macro::Fat, 3.0, "g"),
        ],
    }
}
