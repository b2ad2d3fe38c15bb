//! Identity/session signal consumed by the route guard and the wizard.
//!
//! Authentication itself lives elsewhere; this module only models what the
//! identity provider reports.

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header carrying the authenticated identity on API requests.
pub const IDENTITY_HEADER: &str = "x-identity-id";

/// Opaque identity key, one-to-one with a persisted profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    /// Returns `None` for blank ids.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the identity provider currently knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "identityId", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Still resolving (e.g. token refresh in flight).
    Unknown,
    /// Nobody is signed in.
    Absent,
    Present(IdentityId),
}

impl SessionStatus {
    pub fn identity(&self) -> Option<&IdentityId> {
        match self {
            Self::Present(id) => Some(id),
            Self::Unknown | Self::Absent => None,
        }
    }

    /// Derive the session from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(IdentityId::new)
            .map(Self::Present)
            .unwrap_or(Self::Absent)
    }
}

/// Source of the current identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current(&self) -> SessionStatus;
}

/// Provider with a fixed answer; used per request and in tests.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub SessionStatus);

impl StaticIdentity {
    pub fn signed_in(id: &str) -> Self {
        Self(IdentityId::new(id).map(SessionStatus::Present).unwrap_or(SessionStatus::Absent))
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current(&self) -> SessionStatus {
        self.0.clone()
    }
}
