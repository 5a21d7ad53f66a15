//! Stored policies and the return template built from them.

pub mod returns;
pub mod routes;

pub use returns::{LeMarker, ProjectionRow, ReturnTemplate};
pub use routes::{PolicyRouteState, policy_routes};
