//! Onboarding step machine — tracks which form the user is on.

use serde::Serialize;

/// The steps of the onboarding wizard.
///
/// AwaitingMetadata → AwaitingPremiums, with `restart` returning to
/// AwaitingMetadata from anywhere. Saving a policy does not advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    /// Step 1: policy information form.
    #[default]
    AwaitingMetadata,
    /// Step 2: monthly premiums by year.
    AwaitingPremiums,
}

impl OnboardingStep {
    /// 1-based step number shown to the user.
    pub fn number(&self) -> u8 {
        match self {
            Self::AwaitingMetadata => 1,
            Self::AwaitingPremiums => 2,
        }
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingMetadata => "awaiting_metadata",
            Self::AwaitingPremiums => "awaiting_premiums",
        };
        write!(f, "{s}")
    }
}
