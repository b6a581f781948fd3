use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::dto::{Provenance, ResolvedFood, SearchHit};
use super::repo::FoodCacheStore;
use super::repo_types::CachedFood;
use crate::error::AppError;
use crate::nutrients::normalize;
use crate::usda::{FoodRecord, LookupError, NutritionSource};

const DEFAULT_SERVING_UNIT: &str = "g";
const DEFAULT_SERVING_SIZE: f64 = 100.0;

/// Cache-aside resolution of FoodData Central ids.
///
/// Concurrent misses for the same id are funnelled through one per-id lock,
/// so only the first caller talks to the upstream and the rest re-read the
/// cache once it is filled.
pub struct FoodResolver {
    store: Arc<dyn FoodCacheStore>,
    source: Arc<dyn NutritionSource>,
    timeout: Duration,
    inflight: StdMutex<HashMap<i64, Arc<Mutex<()>>>>,
}

/// One caller's claim on the per-id lock. Dropping it, including when the
/// resolve future is cancelled, forgets the lock once nobody else holds it.
struct InflightSlot<'a> {
    inflight: &'a StdMutex<HashMap<i64, Arc<Mutex<()>>>>,
    fdc_id: i64,
    lock: Arc<Mutex<()>>,
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        // map + ours; anything more means someone is still waiting
        if Arc::strong_count(&self.lock) <= 2 {
            inflight.remove(&self.fdc_id);
        }
    }
}

impl FoodResolver {
    pub fn new(
        store: Arc<dyn FoodCacheStore>,
        source: Arc<dyn NutritionSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            source,
            timeout,
            inflight: StdMutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, fdc_id: i64) -> Result<ResolvedFood, AppError> {
        if let Some(food) = self.store.get(fdc_id).await? {
            debug!(fdc_id, "food cache hit");
            return Ok(ResolvedFood {
                source: Provenance::Cache,
                data: food,
            });
        }

        let slot = self.claim(fdc_id);
        let _guard = slot.lock.lock().await;
        self.fill(fdc_id).await
    }

    fn claim(&self, fdc_id: i64) -> InflightSlot<'_> {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = Arc::clone(
            inflight
                .entry(fdc_id)
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        InflightSlot {
            inflight: &self.inflight,
            fdc_id,
            lock,
        }
    }

    async fn fill(&self, fdc_id: i64) -> Result<ResolvedFood, AppError> {
        // another caller may have filled it while we waited
        if let Some(food) = self.store.get(fdc_id).await? {
            debug!(fdc_id, "food cache filled by concurrent resolve");
            return Ok(ResolvedFood {
                source: Provenance::Cache,
                data: food,
            });
        }

        let record = match tokio::time::timeout(self.timeout, self.source.lookup(fdc_id)).await {
            Ok(Ok(record)) => record,
            Ok(Err(LookupError::NotFound)) => {
                warn!(fdc_id, "food not found upstream");
                return Err(AppError::FoodNotFound(fdc_id));
            }
            Ok(Err(LookupError::Transient(e))) => {
                warn!(fdc_id, error = %e, "upstream lookup failed");
                return Err(AppError::UpstreamUnavailable(e));
            }
            Err(_) => {
                warn!(fdc_id, timeout = ?self.timeout, "upstream lookup timed out");
                return Err(AppError::UpstreamUnavailable("lookup timed out".into()));
            }
        };

        let food = to_cached(fdc_id, record);
        self.store.put(&food).await?;
        info!(fdc_id, nutrients = food.nutrients.len(), "food cached from upstream");

        Ok(ResolvedFood {
            source: Provenance::Api,
            data: food,
        })
    }
}

/// Keyed by the requested id so later lookups of that id hit the cache.
fn to_cached(fdc_id: i64, record: FoodRecord) -> CachedFood {
    let explicit_serving = record.serving_size.filter(|s| *s > 0.0);
    CachedFood {
        fdc_id,
        description: record.description,
        brand_name: record.brand_name.filter(|b| !b.trim().is_empty()),
        serving_size_unit: record
            .serving_size_unit
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVING_UNIT.to_string()),
        serving_size: explicit_serving.unwrap_or(DEFAULT_SERVING_SIZE),
        has_real_serving: explicit_serving.is_some(),
        nutrients: normalize(record.nutrients),
    }
}

/// Stateless passthrough to the upstream search; nothing is cached.
pub async fn search_foods(
    source: &dyn NutritionSource,
    query: &str,
    timeout: Duration,
) -> Result<Vec<SearchHit>, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Query parameter is required".into()));
    }

    let records = match tokio::time::timeout(timeout, source.search(query)).await {
        Ok(Ok(records)) => records,
        Ok(Err(LookupError::NotFound)) => Vec::new(),
        Ok(Err(LookupError::Transient(e))) => return Err(AppError::UpstreamUnavailable(e)),
        Err(_) => return Err(AppError::UpstreamUnavailable("search timed out".into())),
    };

    Ok(records
        .into_iter()
        .map(|r| SearchHit {
            fdc_id: r.fdc_id,
            description: r.description,
            brand_name: r.brand_name.unwrap_or_default(),
            nutrients: normalize(r.nutrients)
                .into_iter()
                .map(|n| (n.nutrient_name, n.value))
                .collect(),
        })
        .collect())
}
