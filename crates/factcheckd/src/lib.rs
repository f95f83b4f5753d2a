//! factcheckd library: HTTP surface over the verification engine.

pub mod routes;
pub mod server;

pub use server::{router, AppState};
