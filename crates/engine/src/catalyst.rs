//! Region sync from the upstream Catalyst catalog.
//!
//! The catalog is a JSON document keyed by environment; the `prod`
//! environment's `full_name` map lists region codes and display names.

use std::collections::BTreeMap;
use std::sync::Arc;

use leaderboard_core::stats::{InsertCounts, JobType, Region};
use leaderboard_core::store::{RegionRefresher, StatsStore};
use serde::Deserialize;
use tokio::sync::Mutex;

#[derive(Debug, Deserialize)]
struct CatalystCatalog {
    prod: CatalystEnvironment,
}

#[derive(Debug, Deserialize)]
struct CatalystEnvironment {
    #[serde(default)]
    full_name: BTreeMap<String, String>,
}

/// Regions listed in a catalog document. Codes are upper-cased; every
/// catalog region hosts transcoding.
pub fn parse_regions(body: &str) -> Result<Vec<Region>, serde_json::Error> {
    let catalog: CatalystCatalog = serde_json::from_str(body)?;
    Ok(catalog
        .prod
        .full_name
        .into_iter()
        .map(|(code, display_name)| Region {
            name: code.to_uppercase(),
            display_name,
            job_type: JobType::Transcoding,
        })
        .collect())
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Pulls the Catalyst region catalog and persists it through a store.
pub struct CatalystRegionSync<S> {
    client: reqwest::Client,
    url: Option<String>,
    store: Arc<S>,
    // Concurrent cache misses share one sync at a time.
    running: Mutex<()>,
}

impl<S: StatsStore> CatalystRegionSync<S> {
    /// Without a URL the sync is disabled and every pull is a no-op.
    pub fn new(store: Arc<S>, url: Option<String>) -> Self {
        if url.is_none() {
            tracing::warn!("No Catalyst region URL configured, region sync disabled");
        }
        Self {
            client: reqwest::Client::new(),
            url,
            store,
            running: Mutex::new(()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Region>, FetchError> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_regions(&body)?)
    }
}

impl<S: StatsStore> RegionRefresher for CatalystRegionSync<S> {
    async fn pull_and_persist_regions(&self) -> InsertCounts {
        let Some(url) = self.url.as_deref() else {
            return InsertCounts::default();
        };
        let _guard = self.running.lock().await;

        let regions = match self.fetch(url).await {
            Ok(regions) => regions,
            Err(e) => {
                tracing::error!(url, error = %e, "Failed to fetch Catalyst regions");
                return InsertCounts::default();
            }
        };
        if regions.is_empty() {
            tracing::error!(url, "No regions found in Catalyst catalog");
            return InsertCounts::default();
        }

        let counts = self.store.insert_regions(&regions).await;
        if counts.inserted != regions.len() {
            tracing::debug!(
                inserted = counts.inserted,
                found = regions.len(),
                "Some Catalyst regions already existed",
            );
        }
        tracing::info!(
            inserted = counts.inserted,
            processed = counts.processed,
            "Catalyst regions synced"
        );
        counts
    }
}
