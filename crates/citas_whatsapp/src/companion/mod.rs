//! The standalone verification service that owns the codes and talks to the
//! chat gateway. The public backend reaches it through the proxy in `handlers`.

pub mod auth;
pub mod handlers;
pub mod routes;

pub use handlers::CompanionState;
pub use routes::{companion_routes, companion_state};
