pub mod error;
pub mod messages;
pub mod middleware;
pub mod notify;
pub mod reactions;
pub mod sessions;
pub mod state;
pub mod stats;
