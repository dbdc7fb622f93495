pub mod handlers;
pub mod protocol;
pub mod server;

pub use handlers::{AppState, status_for};
pub use server::{build_state, router, VoteServer};
