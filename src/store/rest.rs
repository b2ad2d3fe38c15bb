//! Hosted profile store: PostgREST-style HTTP client.
//!
//! Reads `GET {base}/rest/v1/{table}?user_id=eq.{id}` and upserts with
//! `POST {base}/rest/v1/{table}?on_conflict=user_id` plus
//! `Prefer: resolution=merge-duplicates`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::StoreError;
use crate::onboarding::model::TraderProfile;
use crate::session::IdentityId;

use super::traits::{LoadOutcome, ProfileStore};
use super::wire::ProfileRow;

/// Connection settings for the hosted store.
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub table: String,
    pub timeout: Duration,
}

pub struct RestProfileStore {
    config: RestStoreConfig,
    client: reqwest::Client,
}

impl RestProfileStore {
    pub fn new(config: RestStoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.config.api_key.expose_secret();
        request
            .header("apikey", key)
            .bearer_auth(key)
            .header("Accept", "application/json")
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(StoreError::Unauthorized);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Status {
            code: status.as_u16(),
            body,
        })
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    async fn load_profile(&self, identity: &IdentityId) -> Result<LoadOutcome, StoreError> {
        let resp = self
            .authorized(self.client.get(self.table_url()))
            .query(&[
                ("user_id", format!("eq.{}", identity.as_str())),
                ("select", "*".to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<ProfileRow> = Self::check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        match rows.into_iter().next() {
            Some(row) => Ok(LoadOutcome::Found(row.into_persisted()?)),
            None => {
                debug!(identity = %identity, "No remote profile");
                Ok(LoadOutcome::NotFound)
            }
        }
    }

    async fn save_profile(
        &self,
        identity: &IdentityId,
        profile: &TraderProfile,
    ) -> Result<(), StoreError> {
        let row = ProfileRow::for_upsert(identity, profile);
        let resp = self
            .authorized(self.client.post(self.table_url()))
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row])
            .send()
            .await
            .map_err(transport)?;

        Self::check_status(resp).await?;
        debug!(identity = %identity, "Remote profile upserted");
        Ok(())
    }
}
