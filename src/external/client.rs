use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// A meal as returned by TheMealDB; unmodelled fields pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMeal {
    #[serde(rename = "idMeal")]
    pub id: String,
    #[serde(rename = "strMeal")]
    pub name: String,
    #[serde(rename = "strCategory", default)]
    pub category: Option<String>,
    #[serde(rename = "strArea", default)]
    pub area: Option<String>,
    #[serde(rename = "strInstructions", default)]
    pub instructions: Option<String>,
    #[serde(rename = "strMealThumb", default)]
    pub thumbnail: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct MealsEnvelope {
    meals: Option<Vec<ExternalMeal>>,
}

/// Read-only client for the external recipe catalogue.
#[derive(Clone)]
pub struct MealDbClient {
    http: reqwest::Client,
    base_url: Arc<str>,
}

impl MealDbClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').into(),
        }
    }

    async fn fetch(&self, endpoint: &str, query: &[(&str, &str)]) -> reqwest::Result<Vec<ExternalMeal>> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, "calling external recipe api");
        let body: MealsEnvelope = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.meals.unwrap_or_default())
    }

    /// First meal of `random.php`, if upstream returned any.
    #[instrument(skip(self))]
    pub async fn random(&self) -> reqwest::Result<Option<ExternalMeal>> {
        Ok(self.fetch("random.php", &[]).await?.into_iter().next())
    }

    /// `search.php?s=<term>`; upstream's `null` becomes an empty list.
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str) -> reqwest::Result<Vec<ExternalMeal>> {
        self.fetch("search.php", &[("s", term)]).await
    }
}
