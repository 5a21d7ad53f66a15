//! Error types for Policy Onboard.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Record store errors. Opaque to the onboarding core, which only
/// forwards the message.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Errors raised by the onboarding state machine.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Invalid value for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("Cannot {action} while {step}")]
    WrongStep {
        action: &'static str,
        step: String,
    },

    #[error("No premiums parsed. Please check your input.")]
    EmptySchedule,

    #[error("Failed to save policy: {0}")]
    Store(#[from] StoreError),
}

/// Return template errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Policy {key} not found")]
    PolicyNotFound { key: String },

    #[error("Invalid investment amount: {0}")]
    InvalidInvestment(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
