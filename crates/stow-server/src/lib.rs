//! HTTP server for Stow.
//!
//! Exposes a [`StorageBackend`](stow_store::StorageBackend) over HTTP:
//!
//! - `POST /store/*path` -- store the request body, answer `{newFile, updated, strongDigest}`
//! - `GET /store/*path` -- stream the latest version, `404` if never written
//! - `GET /meta/*path` -- version history as a JSON array
//! - `GET /hash/:digest` -- `{exists}` for a SHA-512 digest
//! - `GET /v1/health` -- liveness

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, DIGEST_HEADER};
pub use router::build_router;
pub use server::StowServer;
