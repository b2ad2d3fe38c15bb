//! Persistence boundary: the profile store and the local durability marker.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::onboarding::model::TraderProfile;
use crate::session::IdentityId;

/// A profile record as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProfile {
    pub identity_id: IdentityId,
    pub profile: TraderProfile,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of a profile lookup. A missing record is the first-time-user case.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Found(PersistedProfile),
    NotFound,
}

impl LoadOutcome {
    pub fn into_found(self) -> Option<PersistedProfile> {
        match self {
            Self::Found(p) => Some(p),
            Self::NotFound => None,
        }
    }
}

/// The sole boundary to the profile record store.
///
/// `save_profile` is a whole-record upsert keyed by identity (create or
/// replace, never a partial patch) and marks the record as onboarded.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_profile(&self, identity: &IdentityId) -> Result<LoadOutcome, StoreError>;

    async fn save_profile(
        &self,
        identity: &IdentityId,
        profile: &TraderProfile,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: ProfileStore + ?Sized> ProfileStore for Arc<T> {
    async fn load_profile(&self, identity: &IdentityId) -> Result<LoadOutcome, StoreError> {
        (**self).load_profile(identity).await
    }

    async fn save_profile(
        &self,
        identity: &IdentityId,
        profile: &TraderProfile,
    ) -> Result<(), StoreError> {
        (**self).save_profile(identity, profile).await
    }
}

/// What this device remembers about a past commit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalSnapshot {
    pub completed: bool,
    pub profile: Option<TraderProfile>,
}

/// Device-local fallback memory of completion. Never authoritative.
#[async_trait]
pub trait LocalMarker: Send + Sync {
    async fn read_marker(&self, identity: &IdentityId) -> Result<LocalSnapshot, StoreError>;

    async fn write_marker(
        &self,
        identity: &IdentityId,
        profile: &TraderProfile,
    ) -> Result<(), StoreError>;

    async fn clear_marker(&self, identity: &IdentityId) -> Result<(), StoreError>;
}
