//! REST endpoints for the onboarding wizard, the route guard and the
//! stored profile.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::{PersistError, WizardError};
use crate::guard::RouteGuard;
use crate::session::{IdentityId, SessionStatus, StaticIdentity};
use crate::store::traits::{LoadOutcome, LocalMarker, ProfileStore};

use super::manager::{AdvanceOutcome, OnboardingManager, write_marker};
use super::model::{ProfileUpdate, TraderProfile};
use super::state::WizardPhase;

type Reply = (StatusCode, Json<Value>);

/// One mounted wizard per signed-in identity.
pub struct SessionHub {
    store: Arc<dyn ProfileStore>,
    marker: Option<Arc<dyn LocalMarker>>,
    sessions: RwLock<HashMap<IdentityId, Arc<OnboardingManager>>>,
}

impl SessionHub {
    pub fn new(store: Arc<dyn ProfileStore>, marker: Option<Arc<dyn LocalMarker>>) -> Self {
        Self {
            store,
            marker,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Return the identity's wizard, mounting one if needed.
    ///
    /// Hydration runs on every open and is a no-op once the wizard has
    /// loaded, so a session whose first open was cancelled mid-load
    /// recovers on the next one.
    pub async fn open(&self, identity: &IdentityId) -> Arc<OnboardingManager> {
        let manager = match self.get(identity).await {
            Some(existing) => existing,
            None => {
                let mut sessions = self.sessions.write().await;
                let manager = sessions.entry(identity.clone()).or_insert_with(|| {
                    info!(identity = %identity, "Onboarding session opened");
                    Arc::new(OnboardingManager::new(
                        Arc::new(StaticIdentity(SessionStatus::Present(identity.clone()))),
                        Arc::clone(&self.store),
                        self.marker.clone(),
                    ))
                });
                Arc::clone(manager)
            }
        };
        manager.hydrate().await;
        manager
    }

    pub async fn get(&self, identity: &IdentityId) -> Option<Arc<OnboardingManager>> {
        self.sessions.read().await.get(identity).cloned()
    }

    /// Edit a completed profile.
    ///
    /// Goes through the mounted wizard when there is one so its draft stays
    /// current; otherwise edits the stored record without mounting a session.
    pub async fn edit_profile(
        &self,
        identity: &IdentityId,
        updates: Vec<ProfileUpdate>,
    ) -> Result<TraderProfile, WizardError> {
        if let Some(manager) = self.get(identity).await {
            return manager.save_edit(updates).await;
        }
        let record = match self
            .store
            .load_profile(identity)
            .await
            .map_err(PersistError::from)?
        {
            LoadOutcome::Found(record) if record.completed => record,
            _ => {
                return Err(WizardError::NotEditable {
                    phase: WizardPhase::Editing.to_string(),
                });
            }
        };
        let next = record.profile.merged(updates)?;
        self.store
            .save_profile(identity, &next)
            .await
            .map_err(PersistError::from)?;
        write_marker(self.marker.as_ref(), identity, &next).await;
        info!(identity = %identity, "Profile updated");
        Ok(next)
    }

    /// Unmount and forget the identity's wizard. Returns whether one existed.
    pub async fn close(&self, identity: &IdentityId) -> bool {
        match self.sessions.write().await.remove(identity) {
            Some(manager) => {
                manager.unmount();
                info!(identity = %identity, "Onboarding session closed");
                true
            }
            None => false,
        }
    }
}

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub hub: Arc<SessionHub>,
    pub guard: Arc<RouteGuard>,
    pub store: Arc<dyn ProfileStore>,
}

impl OnboardingRouteState {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        marker: Option<Arc<dyn LocalMarker>>,
        guard: RouteGuard,
    ) -> Self {
        Self {
            hub: Arc::new(SessionHub::new(Arc::clone(&store), marker)),
            guard: Arc::new(guard),
            store,
        }
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/guard", get(guard_decision))
        .route(
            "/api/onboarding/session",
            post(open_session).delete(close_session),
        )
        .route("/api/onboarding/status", get(status))
        .route("/api/onboarding/draft", patch(update_draft))
        .route("/api/onboarding/draft/watchlist", post(set_watchlist))
        .route("/api/onboarding/advance", post(advance))
        .route("/api/onboarding/retreat", post(retreat))
        .route("/api/onboarding/profile", get(get_profile).put(edit_profile))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error(status: StatusCode, message: impl std::fmt::Display) -> Reply {
    (status, Json(json!({"error": message.to_string()})))
}

fn require_identity(headers: &HeaderMap) -> Result<IdentityId, Reply> {
    SessionStatus::from_headers(headers)
        .identity()
        .cloned()
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Not signed in"))
}

async fn require_session(
    state: &OnboardingRouteState,
    headers: &HeaderMap,
) -> Result<Arc<OnboardingManager>, Reply> {
    let identity = require_identity(headers)?;
    state
        .hub
        .get(&identity)
        .await
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "No onboarding session"))
}

fn wizard_error(e: WizardError) -> Reply {
    let status = match &e {
        WizardError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WizardError::NotEditable { .. } => StatusCode::CONFLICT,
        WizardError::Persist(PersistError::NoIdentity) => StatusCode::UNAUTHORIZED,
        WizardError::Persist(_) => StatusCode::BAD_GATEWAY,
    };
    error(status, e)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> Reply {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "investor-os-onboarding"
        })),
    )
}

// ── Guard ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GuardQuery {
    route: String,
}

async fn guard_decision(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
    Query(query): Query<GuardQuery>,
) -> Reply {
    let session = SessionStatus::from_headers(&headers);
    let decision = state
        .guard
        .resolve(&session, state.store.as_ref(), &query.route)
        .await;
    debug!(route = %query.route, ?decision, "Guard decision");
    (StatusCode::OK, Json(json!(decision)))
}

// ── Wizard ──────────────────────────────────────────────────────────────

async fn open_session(State(state): State<OnboardingRouteState>, headers: HeaderMap) -> Reply {
    let identity = match require_identity(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let manager = state.hub.open(&identity).await;
    (StatusCode::OK, Json(json!(manager.snapshot().await)))
}

async fn close_session(State(state): State<OnboardingRouteState>, headers: HeaderMap) -> Reply {
    let identity = match require_identity(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let closed = state.hub.close(&identity).await;
    (StatusCode::OK, Json(json!({"closed": closed})))
}

async fn status(State(state): State<OnboardingRouteState>, headers: HeaderMap) -> Reply {
    match require_session(&state, &headers).await {
        Ok(manager) => (StatusCode::OK, Json(json!(manager.snapshot().await))),
        Err(reply) => reply,
    }
}

async fn update_draft(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
    Json(updates): Json<Vec<ProfileUpdate>>,
) -> Reply {
    let manager = match require_session(&state, &headers).await {
        Ok(m) => m,
        Err(reply) => return reply,
    };
    match manager.update_field(updates).await {
        Ok(draft) => (StatusCode::OK, Json(json!(draft))),
        Err(e) => wizard_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct WatchlistBody {
    raw: String,
}

async fn set_watchlist(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
    Json(body): Json<WatchlistBody>,
) -> Reply {
    let manager = match require_session(&state, &headers).await {
        Ok(m) => m,
        Err(reply) => return reply,
    };
    match manager.set_watchlist(&body.raw).await {
        Ok(draft) => (StatusCode::OK, Json(json!(draft))),
        Err(e) => wizard_error(e),
    }
}

async fn advance(State(state): State<OnboardingRouteState>, headers: HeaderMap) -> Reply {
    let manager = match require_session(&state, &headers).await {
        Ok(m) => m,
        Err(reply) => return reply,
    };
    match manager.advance().await {
        Ok(outcome) => {
            if outcome == AdvanceOutcome::Completed {
                info!("Wizard completed via advance");
            }
            (
                StatusCode::OK,
                Json(json!({
                    "result": outcome,
                    "wizard": manager.snapshot().await,
                })),
            )
        }
        Err(e) => {
            warn!(error = %e, "Advance failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": e.to_string(),
                    "wizard": manager.snapshot().await,
                })),
            )
        }
    }
}

async fn retreat(State(state): State<OnboardingRouteState>, headers: HeaderMap) -> Reply {
    let manager = match require_session(&state, &headers).await {
        Ok(m) => m,
        Err(reply) => return reply,
    };
    manager.retreat().await;
    (StatusCode::OK, Json(json!(manager.snapshot().await)))
}

// ── Profile ─────────────────────────────────────────────────────────────

async fn get_profile(State(state): State<OnboardingRouteState>, headers: HeaderMap) -> Reply {
    let identity = match require_identity(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    match state.store.load_profile(&identity).await {
        Ok(LoadOutcome::Found(record)) => (StatusCode::OK, Json(json!(record))),
        Ok(LoadOutcome::NotFound) => error(StatusCode::NOT_FOUND, "No profile exists yet"),
        Err(e) => {
            warn!(identity = %identity, error = %e, "Profile lookup failed");
            error(StatusCode::BAD_GATEWAY, e)
        }
    }
}

async fn edit_profile(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
    Json(updates): Json<Vec<ProfileUpdate>>,
) -> Reply {
    let identity = match require_identity(&headers) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    match state.hub.edit_profile(&identity, updates).await {
        Ok(profile) => (StatusCode::OK, Json(json!(profile))),
        Err(e) => wizard_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::error::StoreError;
    use crate::session::IDENTITY_HEADER;
    use crate::store::libsql_backend::LibSqlBackend;

    async fn app() -> Router {
        let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let state = OnboardingRouteState::new(
            backend.clone(),
            Some(backend as Arc<dyn LocalMarker>),
            RouteGuard::default(),
        );
        onboarding_routes(state)
    }

    fn request(method: &str, uri: &str, identity: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = identity {
            builder = builder.header(IDENTITY_HEADER, id);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = app().await;
        let (status, body) = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn wizard_requires_identity() {
        let app = app().await;
        let (status, _) = send(&app, request("POST", "/api/onboarding/session", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_without_session_is_not_found() {
        let app = app().await;
        let (status, _) = send(&app, request("GET", "/api/onboarding/status", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn draft_patch_validates() {
        let app = app().await;
        send(&app, request("POST", "/api/onboarding/session", Some("u1"), None)).await;

        let (status, body) = send(
            &app,
            request(
                "PATCH",
                "/api/onboarding/draft",
                Some("u1"),
                Some(json!([{"field": "riskLevel", "value": "high"}])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["riskLevel"], "high");

        let (status, _) = send(
            &app,
            request(
                "PATCH",
                "/api/onboarding/draft",
                Some("u1"),
                Some(json!([{
                    "field": "advancedSettings",
                    "value": {"accountSize": "-10"}
                }])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn full_walk_completes_and_guard_lets_through() {
        let app = app().await;

        let (_, decision) = send(&app, request("GET", "/api/guard?route=/dashboard", Some("u1"), None)).await;
        assert_eq!(decision, json!({"render": "redirect", "to": "/onboarding"}));

        send(&app, request("POST", "/api/onboarding/session", Some("u1"), None)).await;
        for _ in 0..8 {
            send(&app, request("POST", "/api/onboarding/advance", Some("u1"), None)).await;
        }
        let (status, body) = send(&app, request("POST", "/api/onboarding/advance", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["outcome"], "completed");
        assert_eq!(body["wizard"]["phase"], "completed");

        let (_, decision) = send(&app, request("GET", "/api/guard?route=/dashboard", Some("u1"), None)).await;
        assert_eq!(decision, json!({"render": "protected", "route": "/dashboard"}));

        let (status, profile) = send(&app, request("GET", "/api/onboarding/profile", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["completed"], true);

        let (status, _) = send(
            &app,
            request(
                "PATCH",
                "/api/onboarding/draft",
                Some("u1"),
                Some(json!([{"field": "riskLevel", "value": "low"}])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn profile_missing_is_not_found() {
        let app = app().await;
        let (status, _) = send(&app, request("GET", "/api/onboarding/profile", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn closing_a_session_forgets_it() {
        let app = app().await;
        send(&app, request("POST", "/api/onboarding/session", Some("u1"), None)).await;
        let (_, body) = send(&app, request("DELETE", "/api/onboarding/session", Some("u1"), None)).await;
        assert_eq!(body["closed"], true);
        let (status, _) = send(&app, request("GET", "/api/onboarding/status", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_edit_without_session_does_not_mount_one() {
        let app = app().await;
        send(&app, request("POST", "/api/onboarding/session", Some("u1"), None)).await;
        for _ in 0..9 {
            send(&app, request("POST", "/api/onboarding/advance", Some("u1"), None)).await;
        }
        send(&app, request("DELETE", "/api/onboarding/session", Some("u1"), None)).await;

        let (status, profile) = send(
            &app,
            request(
                "PUT",
                "/api/onboarding/profile",
                Some("u1"),
                Some(json!([{"field": "riskLevel", "value": "high"}])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["riskLevel"], "high");

        let (status, _) = send(&app, request("GET", "/api/onboarding/status", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, record) = send(&app, request("GET", "/api/onboarding/profile", Some("u1"), None)).await;
        assert_eq!(record["profile"]["riskLevel"], "high");
    }

    #[tokio::test]
    async fn profile_edit_requires_completed_onboarding() {
        let app = app().await;
        let (status, _) = send(
            &app,
            request(
                "PUT",
                "/api/onboarding/profile",
                Some("u2"),
                Some(json!([{"field": "riskLevel", "value": "high"}])),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&app, request("GET", "/api/onboarding/status", Some("u2"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    struct SlowLoads {
        inner: LibSqlBackend,
        slow: AtomicBool,
    }

    #[async_trait]
    impl ProfileStore for SlowLoads {
        async fn load_profile(&self, identity: &IdentityId) -> Result<LoadOutcome, StoreError> {
            if self.slow.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            self.inner.load_profile(identity).await
        }

        async fn save_profile(
            &self,
            identity: &IdentityId,
            profile: &TraderProfile,
        ) -> Result<(), StoreError> {
            self.inner.save_profile(identity, profile).await
        }
    }

    #[tokio::test]
    async fn reopen_finishes_a_cancelled_hydration() {
        let store = Arc::new(SlowLoads {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            slow: AtomicBool::new(true),
        });
        let hub = SessionHub::new(store.clone(), None);
        let id = IdentityId::new("u1").unwrap();

        let cancelled = tokio::time::timeout(Duration::from_millis(20), hub.open(&id)).await;
        assert!(cancelled.is_err());
        let stuck = hub.get(&id).await.unwrap();
        assert_eq!(stuck.snapshot().await.phase, WizardPhase::Loading);

        store.slow.store(false, Ordering::SeqCst);
        let manager = hub.open(&id).await;
        assert!(Arc::ptr_eq(&manager, &stuck));
        assert_eq!(manager.snapshot().await.phase, WizardPhase::Editing);
    }
}
