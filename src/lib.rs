//! InvestorOS: trader onboarding service.

pub mod config;
pub mod error;
pub mod guard;
pub mod onboarding;
pub mod session;
pub mod store;
