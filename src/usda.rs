use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::UsdaConfig;
use crate::nutrients::RawNutrient;

/// A food as reported by the external nutrition database.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodRecord {
    pub fdc_id: i64,
    pub description: String,
    pub brand_name: Option<String>,
    pub serving_size_unit: Option<String>,
    pub serving_size: Option<f64>,
    pub nutrients: Vec<RawNutrient>,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("food not found upstream")]
    NotFound,
    #[error("{0}")]
    Transient(String),
}

#[async_trait]
pub trait NutritionSource: Send + Sync {
    async fn lookup(&self, fdc_id: i64) -> Result<FoodRecord, LookupError>;
    async fn search(&self, query: &str) -> Result<Vec<FoodRecord>, LookupError>;
}

#[derive(Clone)]
pub struct UsdaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl UsdaClient {
    pub fn new(cfg: &UsdaConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build usda http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, LookupError> {
        let response = self
            .http
            .get(url)
            .header("x-api-key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, %url, "usda request failed");
                LookupError::Transient(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %url, "usda returned an error status");
            return Err(LookupError::Transient(format!("HTTP {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| LookupError::Transient(format!("JSON parse error: {e}")))
    }
}

#[async_trait]
impl NutritionSource for UsdaClient {
    async fn lookup(&self, fdc_id: i64) -> Result<FoodRecord, LookupError> {
        let url = format!("{}/food/{}", self.base_url, fdc_id);
        let details: FoodDetailsResponse = self.get_json(&url, &[]).await?;
        debug!(fdc_id, nutrients = details.food_nutrients.len(), "usda food fetched");
        Ok(details.into())
    }

    async fn search(&self, query: &str) -> Result<Vec<FoodRecord>, LookupError> {
        let url = format!("{}/foods/search", self.base_url);
        let found: SearchResponse = self.get_json(&url, &[("query", query)]).await?;
        Ok(found.foods.into_iter().map(Into::into).collect())
    }
}

// ---- wire format ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoodDetailsResponse {
    fdc_id: i64,
    description: String,
    brand_name: Option<String>,
    serving_size: Option<f64>,
    serving_size_unit: Option<String>,
    #[serde(default)]
    food_nutrients: Vec<DetailNutrient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailNutrient {
    nutrient: Option<NutrientInfo>,
    amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NutrientInfo {
    id: u32,
    name: String,
    #[serde(default)]
    unit_name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<SearchFood>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchFood {
    fdc_id: i64,
    description: String,
    brand_name: Option<String>,
    #[serde(default)]
    food_nutrients: Vec<SearchNutrient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNutrient {
    nutrient_id: u32,
    nutrient_name: String,
    #[serde(default)]
    unit_name: String,
    value: Option<f64>,
}

impl From<FoodDetailsResponse> for FoodRecord {
    fn from(r: FoodDetailsResponse) -> Self {
        let nutrients = r
            .food_nutrients
            .into_iter()
            .filter_map(|n| {
                // an entry without an amount must not claim the macro's slot
                let info = n.nutrient?;
                Some(RawNutrient {
                    id: info.id,
                    name: info.name,
                    value: n.amount?,
                    unit_name: info.unit_name,
                })
            })
            .collect();
        Self {
            fdc_id: r.fdc_id,
            description: r.description,
            brand_name: r.brand_name,
            serving_size_unit: r.serving_size_unit,
            serving_size: r.serving_size,
            nutrients,
        }
    }
}

impl From<SearchFood> for FoodRecord {
    fn from(f: SearchFood) -> Self {
        Self {
            fdc_id: f.fdc_id,
            description: f.description,
            brand_name: f.brand_name,
            serving_size_unit: None,
            serving_size: None,
            nutrients: f
                .food_nutrients
                .into_iter()
                .filter_map(|n| {
                    Some(RawNutrient {
                        id: n.nutrient_id,
                        name: n.nutrient_name,
                        value: n.value?,
                        unit_name: n.unit_name,
                    })
                })
                .collect(),
        }
    }
}
