//! HTTP ingress server for operion event-source providers.

pub mod error;
pub mod handler;
pub mod state;
pub mod server;

pub use server::{build_router, serve};
pub use state::WebhookServerState;
