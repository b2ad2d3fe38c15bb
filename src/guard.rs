//! Route guard: sequences the session check and the onboarding-completion
//! check to pick what a protected route renders.

use serde::Serialize;
use tracing::warn;

use crate::config::GuardConfig;
use crate::session::{IdentityId, SessionStatus};
use crate::store::traits::{LoadOutcome, ProfileStore};

/// Onboarding completion as seen by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSignal {
    /// Still loading; the decision must wait.
    Pending,
    Incomplete,
    Complete,
}

impl From<bool> for CompletionSignal {
    fn from(completed: bool) -> Self {
        if completed {
            Self::Complete
        } else {
            Self::Incomplete
        }
    }
}

/// What to render for a requested route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "render", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Loading indicator; the decision is suspended.
    Loading,
    /// Login view, remembering where the user was headed.
    Login { from: String },
    /// Redirect (replacing history) to the onboarding route.
    Redirect { to: String },
    /// The onboarding view itself.
    Onboarding,
    /// The requested protected content.
    Protected { route: String },
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    onboarding_route: String,
    login_route: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(&GuardConfig::default())
    }
}

/// Strip query/fragment and trailing slashes so `/onboarding/?x=1` matches.
fn normalize(route: &str) -> &str {
    let path = route.split(['?', '#']).next().unwrap_or(route);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

impl RouteGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            onboarding_route: normalize(&config.onboarding_route).to_string(),
            login_route: normalize(&config.login_route).to_string(),
        }
    }

    pub fn onboarding_route(&self) -> &str {
        &self.onboarding_route
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    pub fn is_onboarding_route(&self, route: &str) -> bool {
        normalize(route) == self.onboarding_route
    }

    /// Apply the decision table; first match wins.
    ///
    /// 1. session unknown or completion pending → loading
    /// 2. no session → login
    /// 3. incomplete and not already on the onboarding route → redirect there
    /// 4. otherwise → render the requested route
    pub fn decide(
        &self,
        session: &SessionStatus,
        completion: CompletionSignal,
        route: &str,
    ) -> GuardDecision {
        if *session == SessionStatus::Unknown || completion == CompletionSignal::Pending {
            return GuardDecision::Loading;
        }
        if session.identity().is_none() {
            return GuardDecision::Login {
                from: route.to_string(),
            };
        }
        let on_onboarding = self.is_onboarding_route(route);
        if completion == CompletionSignal::Incomplete && !on_onboarding {
            return GuardDecision::Redirect {
                to: self.onboarding_route.clone(),
            };
        }
        if on_onboarding {
            GuardDecision::Onboarding
        } else {
            GuardDecision::Protected {
                route: route.to_string(),
            }
        }
    }

    /// Resolve a decision by querying the store for completion.
    pub async fn resolve(
        &self,
        session: &SessionStatus,
        store: &dyn ProfileStore,
        route: &str,
    ) -> GuardDecision {
        let completion = match session {
            SessionStatus::Unknown => CompletionSignal::Pending,
            SessionStatus::Absent => CompletionSignal::Incomplete,
            SessionStatus::Present(identity) => check_completion(store, identity).await,
        };
        self.decide(session, completion, route)
    }
}

/// Look up whether `identity` finished onboarding.
///
/// A failed lookup counts as incomplete, sending the user back through
/// onboarding rather than granting access with unknown preferences.
pub async fn check_completion(store: &dyn ProfileStore, identity: &IdentityId) -> CompletionSignal {
    match store.load_profile(identity).await {
        Ok(LoadOutcome::Found(profile)) => profile.completed.into(),
        Ok(LoadOutcome::NotFound) => CompletionSignal::Incomplete,
        Err(e) => {
            warn!(identity = %identity, error = %e, "Completion check failed, treating as incomplete");
            CompletionSignal::Incomplete
        }
    }
}
