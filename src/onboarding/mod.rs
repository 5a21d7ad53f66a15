//! Onboarding wizard — two-step capture of a policy and its premiums.
//!
//! Step 1 collects the policy metadata and works out which calendar years
//! need premiums. Step 2 takes pasted monthly premiums per year, parses
//! them, and appends the finished record to the configured store.

pub mod model;
pub mod premiums;
pub mod registry;
pub mod routes;
pub mod session;
pub mod state;
pub mod years;

pub use model::{MetadataInput, PolicyMetadata, PolicyRecord, PremiumSchedule};
pub use registry::SessionRegistry;
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use session::{OnboardingSession, SavedPolicy, SessionStatus};
pub use state::OnboardingStep;
