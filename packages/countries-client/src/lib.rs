//! Cached CountriesNow REST API client.
//!
//! Resolves valid countries, cities, and states for job admission checks.
//! The upstream dataset is static for practical purposes, so responses are
//! cached in-process for the lifetime of the client.

pub mod error;
pub mod types;

pub use error::{CountriesError, Result};
pub use types::CountryCities;

use std::collections::HashMap;

use tokio::sync::RwLock;
use types::{ApiResponse, CountryStates};

pub const DEFAULT_BASE_URL: &str = "https://countriesnow.space/api/v0.1";

#[derive(Default)]
struct Cache {
    countries: Option<Vec<CountryCities>>,
    states: HashMap<String, Vec<String>>,
}

pub struct CountriesClient {
    client: reqwest::Client,
    base_url: String,
    cache: RwLock<Cache>,
}

impl CountriesClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            cache: RwLock::new(Cache::default()),
        }
    }

    /// All known country names, cached after the first fetch.
    pub async fn countries(&self) -> Result<Vec<String>> {
        let entries = self.country_entries().await?;
        Ok(entries.into_iter().map(|e| e.country).collect())
    }

    /// Cities for a country. `Err(UnknownCountry)` if the name (compared
    /// case-insensitively) is not in the dataset.
    pub async fn cities(&self, country: &str) -> Result<Vec<String>> {
        let entries = self.country_entries().await?;
        entries
            .into_iter()
            .find(|e| e.country.eq_ignore_ascii_case(country))
            .map(|e| e.cities)
            .ok_or_else(|| CountriesError::UnknownCountry(country.to_string()))
    }

    /// Whether the country exists in the dataset (case-insensitive).
    pub async fn has_country(&self, country: &str) -> Result<bool> {
        let entries = self.country_entries().await?;
        Ok(entries
            .iter()
            .any(|e| e.country.eq_ignore_ascii_case(country)))
    }

    /// State/region names for a country, cached per country.
    pub async fn states(&self, country: &str) -> Result<Vec<String>> {
        let key = country.to_lowercase();
        if let Some(states) = self.cache.read().await.states.get(&key) {
            return Ok(states.clone());
        }

        let url = format!("{}/countries/states", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "country": country }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CountriesError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse<CountryStates> = resp.json().await?;
        if body.error {
            return Err(CountriesError::UnknownCountry(country.to_string()));
        }

        let states: Vec<String> = body.data.states.into_iter().map(|s| s.name).collect();
        tracing::debug!(country, count = states.len(), "Fetched states");
        self.cache.write().await.states.insert(key, states.clone());
        Ok(states)
    }

    async fn country_entries(&self) -> Result<Vec<CountryCities>> {
        if let Some(entries) = &self.cache.read().await.countries {
            return Ok(entries.clone());
        }

        let url = format!("{}/countries", self.base_url);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CountriesError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse<Vec<CountryCities>> = resp.json().await?;
        if body.error {
            return Err(CountriesError::Api {
                status: status.as_u16(),
                message: body.msg,
            });
        }

        tracing::debug!(count = body.data.len(), "Fetched country list");
        let mut cache = self.cache.write().await;
        cache.countries = Some(body.data.clone());
        Ok(body.data)
    }
}
