//! Policy Onboard — life-settlement policy intake service.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod policies;
pub mod server;
pub mod store;
