//! HTTP client for the scheduling backend.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::envelope::{ApiEnvelope, ApiError};
use crate::config::BackendConfig;
use crate::core::{Ad, AdId, ExistingPlacement, PlacementBatch, Timestamp};

pub type ProgramId = u64;

/// One placement as the backend stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlacementRecord {
    ad_id: AdId,
    start_time: Timestamp,
    end_time: Timestamp,
}

#[derive(Debug, Serialize)]
struct SavePlacementsRequest {
    placements: Vec<PlacementRecord>,
}

impl From<&PlacementBatch> for SavePlacementsRequest {
    fn from(batch: &PlacementBatch) -> Self {
        Self {
            placements: batch
                .placements
                .iter()
                .map(|p| PlacementRecord {
                    ad_id: p.ad.id,
                    start_time: p.start_time,
                    end_time: p.end_time,
                })
                .collect(),
        }
    }
}

/// Thin wrapper over the backend REST endpoints. No retries.
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token,
            http: reqwest::Client::new(),
        }
    }

    /// All ads available for placement
    pub async fn list_ads(&self) -> Result<Vec<Ad>, ApiError> {
        let ads: Option<Vec<Ad>> = self.get(&format!("{}/ads", self.base_url)).await?;
        Ok(ads.unwrap_or_default())
    }

    /// Ads already placed in a program
    pub async fn list_program_ads(
        &self,
        program_id: ProgramId,
    ) -> Result<Vec<ExistingPlacement>, ApiError> {
        let placements: Option<Vec<ExistingPlacement>> = self
            .get(&format!("{}/schedules/{}/ads", self.base_url, program_id))
            .await?;
        Ok(placements.unwrap_or_default())
    }

    /// Persist a placement batch for a program
    pub async fn save_placements(
        &self,
        program_id: ProgramId,
        batch: &PlacementBatch,
    ) -> Result<(), ApiError> {
        let url = format!("{}/schedules/{}/ads", self.base_url, program_id);
        let body = SavePlacementsRequest::from(batch);

        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let envelope: ApiEnvelope<serde_json::Value> = request.send().await?.json().await?;
        envelope.into_result()?;
        info!(program_id, count = batch.len(), "Saved ad placements");
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, ApiError> {
        debug!(url, "GET");
        let mut request = self.http.get(url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let envelope: ApiEnvelope<T> = request.send().await?.json().await?;
        envelope.into_result()
    }
}
