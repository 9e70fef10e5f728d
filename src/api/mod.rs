//! The HTTP API (§6): JSON handlers behind one `/api/v1` router.

mod extract;
mod handlers;
mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
