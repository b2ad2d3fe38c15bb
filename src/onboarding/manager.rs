//! OnboardingManager: coordinates hydration, draft edits, step navigation
//! and the single commit of a trader profile.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{PersistError, ValidationError, WizardError};
use crate::guard::CompletionSignal;
use crate::session::{IdentityId, IdentityProvider};
use crate::store::traits::{LoadOutcome, LocalMarker, LocalSnapshot, ProfileStore};

use super::labels;
use super::model::{MarketUniverse, PortfolioStyle, ProfileUpdate, TraderProfile};
use super::state::{CommitStart, StepMove, TOTAL_STEPS, WizardPhase, WizardState, WizardStep};

/// What a call to `advance` (or `commit`) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "stepIndex", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// Moved to the given step.
    Moved(usize),
    /// The profile was saved and onboarding is complete.
    Completed,
    /// Nothing to do: not editable, already completed, or a commit is in flight.
    Ignored,
    /// The wizard was unmounted; the result was dropped.
    Discarded,
}

/// Everything a view needs to render the wizard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub phase: WizardPhase,
    pub step_index: usize,
    pub step: WizardStep,
    pub title: &'static str,
    pub progress_percent: u8,
    pub advance_label: &'static str,
    pub total_steps: usize,
    pub draft: TraderProfile,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub completion_hint: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Owns one wizard instance for one signed-in user.
pub struct OnboardingManager {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    marker: Option<Arc<dyn LocalMarker>>,
    state: Arc<RwLock<WizardState>>,
    mounted: Arc<AtomicBool>,
}

impl OnboardingManager {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn ProfileStore>,
        marker: Option<Arc<dyn LocalMarker>>,
    ) -> Self {
        Self {
            identity,
            store,
            marker,
            state: Arc::new(RwLock::new(WizardState::default())),
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stop applying async results. Idempotent.
    pub fn unmount(&self) {
        if self.mounted.swap(false, Ordering::SeqCst) {
            debug!("Onboarding wizard unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    async fn current_identity(&self) -> Option<IdentityId> {
        self.identity.current().await.identity().cloned()
    }

    /// Load any stored profile and leave `Loading`.
    ///
    /// The remote store wins over the local marker. If the store cannot be
    /// reached the wizard opens on defaults with an error notice, and a
    /// local completion claim is surfaced only as a hint.
    pub async fn hydrate(&self) {
        if self.state.read().await.phase != WizardPhase::Loading {
            return;
        }

        let Some(identity) = self.current_identity().await else {
            debug!("No identity during hydration, starting from defaults");
            if self.is_mounted() {
                self.state.write().await.finish_loading(None, false);
            }
            return;
        };

        let local = read_marker(self.marker.as_ref(), &identity).await;
        let loaded = self.store.load_profile(&identity).await;

        if !self.is_mounted() {
            debug!(identity = %identity, "Discarding hydration result after unmount");
            return;
        }

        match loaded {
            Ok(LoadOutcome::Found(record)) => {
                info!(identity = %identity, completed = record.completed, "Hydrated stored profile");
                if record.completed {
                    write_marker(self.marker.as_ref(), &identity, &record.profile).await;
                } else if local.completed {
                    clear_marker(self.marker.as_ref(), &identity).await;
                }
                self.state
                    .write()
                    .await
                    .finish_loading(Some(record.profile), record.completed);
            }
            Ok(LoadOutcome::NotFound) => {
                debug!(identity = %identity, "No stored profile, starting from defaults");
                if local.completed {
                    clear_marker(self.marker.as_ref(), &identity).await;
                }
                self.state.write().await.finish_loading(None, false);
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "Profile load failed, starting from defaults");
                let mut state = self.state.write().await;
                state.finish_loading(None, false);
                state.last_error = Some(format!("Could not load your saved profile: {e}"));
                state.completion_hint = local.completed;
            }
        }
    }

    /// Merge updates into the draft. Rejected batches change nothing.
    pub async fn update_field<I>(&self, updates: I) -> Result<TraderProfile, WizardError>
    where
        I: IntoIterator<Item = ProfileUpdate>,
    {
        self.edit_draft(|_| Ok(updates)).await
    }

    pub async fn toggle_portfolio_style(
        &self,
        style: PortfolioStyle,
    ) -> Result<TraderProfile, WizardError> {
        self.edit_draft(|draft| Ok([draft.toggle_portfolio_style(style)]))
            .await
    }

    pub async fn toggle_market(&self, market: MarketUniverse) -> Result<TraderProfile, WizardError> {
        self.edit_draft(|draft| Ok([draft.toggle_market(market)])).await
    }

    /// Parse a comma-separated ticker list into the draft.
    pub async fn set_watchlist(&self, raw: &str) -> Result<TraderProfile, WizardError> {
        self.edit_draft(|draft| draft.watchlist_updates(raw)).await
    }

    /// Derive updates from the current draft and merge them under one write
    /// guard, so a concurrent edit cannot be overwritten by a stale copy.
    async fn edit_draft<F, I>(&self, derive: F) -> Result<TraderProfile, WizardError>
    where
        F: FnOnce(&TraderProfile) -> Result<I, ValidationError>,
        I: IntoIterator<Item = ProfileUpdate>,
    {
        let mut state = self.state.write().await;
        if !state.is_editable() {
            return Err(WizardError::NotEditable {
                phase: state.phase.to_string(),
            });
        }
        let updates = derive(&state.draft)?;
        let next = state.draft.merged(updates)?;
        state.draft = next.clone();
        Ok(next)
    }

    /// Move forward. On the last step this commits.
    pub async fn advance(&self) -> Result<AdvanceOutcome, PersistError> {
        let step = self.state.write().await.advance_step();
        match step {
            StepMove::Moved(index) => Ok(AdvanceOutcome::Moved(index)),
            StepMove::Ignored => Ok(AdvanceOutcome::Ignored),
            StepMove::AtLastStep => self.commit().await,
        }
    }

    /// Move back one step; returns the resulting step index.
    pub async fn retreat(&self) -> usize {
        let mut state = self.state.write().await;
        state.retreat_step();
        state.step_index
    }

    /// Save the draft and mark onboarding complete.
    ///
    /// At most one commit runs at a time; a concurrent call sees `Ignored`.
    /// On failure the wizard returns to the last step with the draft intact.
    /// The save runs on its own task, so dropping this future (a client
    /// disconnect) still settles the wizard out of `Completing`.
    pub async fn commit(&self) -> Result<AdvanceOutcome, PersistError> {
        if !self.is_mounted() {
            return Ok(AdvanceOutcome::Discarded);
        }

        let draft = {
            let mut state = self.state.write().await;
            match state.begin_commit() {
                CommitStart::Started => state.draft.clone(),
                CommitStart::NotAtFinalStep(step_index) => {
                    return Err(PersistError::NotAtFinalStep { step_index });
                }
                CommitStart::AlreadyCompleted | CommitStart::InFlight | CommitStart::NotLoaded => {
                    return Ok(AdvanceOutcome::Ignored);
                }
            }
        };

        let job = CommitJob {
            identity: Arc::clone(&self.identity),
            store: Arc::clone(&self.store),
            marker: self.marker.clone(),
            state: Arc::clone(&self.state),
            mounted: Arc::clone(&self.mounted),
        };
        match tokio::spawn(job.run(draft)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Onboarding commit task failed");
                let e = PersistError::Interrupted(e.to_string());
                self.state.write().await.commit_failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Edit a completed profile and save it straight away.
    pub async fn save_edit<I>(&self, updates: I) -> Result<TraderProfile, WizardError>
    where
        I: IntoIterator<Item = ProfileUpdate>,
    {
        let next = {
            let state = self.state.read().await;
            if state.phase != WizardPhase::Completed {
                return Err(WizardError::NotEditable {
                    phase: state.phase.to_string(),
                });
            }
            state.draft.merged(updates)?
        };

        let identity = self
            .current_identity()
            .await
            .ok_or(PersistError::NoIdentity)?;
        self.store
            .save_profile(&identity, &next)
            .await
            .map_err(PersistError::from)?;

        if self.is_mounted() {
            self.state.write().await.draft = next.clone();
            write_marker(self.marker.as_ref(), &identity, &next).await;
        }
        info!(identity = %identity, "Profile updated");
        Ok(next)
    }

    /// Completion as seen by the route guard.
    pub async fn completion_signal(&self) -> CompletionSignal {
        let state = self.state.read().await;
        if state.phase == WizardPhase::Loading {
            CompletionSignal::Pending
        } else {
            state.is_completed.into()
        }
    }

    pub async fn snapshot(&self) -> WizardSnapshot {
        let state = self.state.read().await;
        let step = state.current_step();
        WizardSnapshot {
            phase: state.phase,
            step_index: state.step_index,
            step,
            title: labels::step_title(step),
            progress_percent: labels::progress_percent(state.step_index),
            advance_label: labels::advance_label(state.step_index),
            total_steps: TOTAL_STEPS,
            draft: state.draft.clone(),
            is_completed: state.is_completed,
            last_error: state.last_error.clone(),
            completion_hint: state.completion_hint,
            summary: state
                .is_completed
                .then(|| state.draft.to_summary_section()),
        }
    }
}

/// The save half of a commit, owning everything it touches.
struct CommitJob {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    marker: Option<Arc<dyn LocalMarker>>,
    state: Arc<RwLock<WizardState>>,
    mounted: Arc<AtomicBool>,
}

impl CommitJob {
    async fn run(self, draft: TraderProfile) -> Result<AdvanceOutcome, PersistError> {
        let saved = match self.identity.current().await.identity().cloned() {
            Some(identity) => self
                .store
                .save_profile(&identity, &draft)
                .await
                .map(|()| identity)
                .map_err(PersistError::from),
            None => Err(PersistError::NoIdentity),
        };

        if !self.mounted.load(Ordering::SeqCst) {
            debug!("Discarding commit result after unmount");
            return Ok(AdvanceOutcome::Discarded);
        }

        match saved {
            Ok(identity) => {
                self.state.write().await.commit_succeeded();
                write_marker(self.marker.as_ref(), &identity, &draft).await;
                info!(identity = %identity, "Onboarding completed");
                Ok(AdvanceOutcome::Completed)
            }
            Err(e) => {
                warn!(error = %e, "Onboarding commit failed");
                self.state.write().await.commit_failed(e.to_string());
                Err(e)
            }
        }
    }
}

async fn read_marker(marker: Option<&Arc<dyn LocalMarker>>, identity: &IdentityId) -> LocalSnapshot {
    let Some(marker) = marker else {
        return LocalSnapshot::default();
    };
    marker.read_marker(identity).await.unwrap_or_else(|e| {
        warn!(identity = %identity, error = %e, "Failed to read local marker");
        LocalSnapshot::default()
    })
}

pub(crate) async fn write_marker(
    marker: Option<&Arc<dyn LocalMarker>>,
    identity: &IdentityId,
    profile: &TraderProfile,
) {
    if let Some(marker) = marker {
        if let Err(e) = marker.write_marker(identity, profile).await {
            warn!(identity = %identity, error = %e, "Failed to write local marker");
        }
    }
}

async fn clear_marker(marker: Option<&Arc<dyn LocalMarker>>, identity: &IdentityId) {
    if let Some(marker) = marker {
        if let Err(e) = marker.clear_marker(identity).await {
            warn!(identity = %identity, error = %e, "Failed to clear local marker");
        }
    }
}
