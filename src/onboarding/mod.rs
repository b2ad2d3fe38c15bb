//! Onboarding wizard: first-login questionnaire that builds a trader
//! profile.
//!
//! Nine fixed steps collect trading preferences into a draft. Advancing past
//! the last step saves the profile exactly once and marks the user as
//! onboarded; the route guard keeps everyone else on the onboarding route.

pub mod labels;
pub mod manager;
pub mod model;
pub mod routes;
pub mod state;

pub use manager::{AdvanceOutcome, OnboardingManager, WizardSnapshot};
pub use model::{ProfileUpdate, TraderProfile};
pub use routes::{OnboardingRouteState, SessionHub, onboarding_routes};
pub use state::{WizardPhase, WizardState, WizardStep};
