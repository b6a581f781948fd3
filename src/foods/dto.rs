use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::repo_types::CachedFood;

/// Where a resolved food came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Cache,
    Api,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFood {
    pub source: Provenance,
    pub data: CachedFood,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub food: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub fdc_id: i64,
    pub description: String,
    pub brand_name: String,
    pub nutrients: BTreeMap<String, f64>,
}
