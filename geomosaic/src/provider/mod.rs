//! Upstream tile server access.
//!
//! Splits network access into a small [`AsyncHttpClient`] abstraction
//! (dependency-injectable so download logic is testable without a
//! network) and the [`TileService`] that knows the upstream URL scheme
//! and time-index format.

mod http;
mod service;

pub use http::{AsyncHttpClient, HttpError, ReqwestClient};
pub use service::{TileService, TimeIndex, TimeIndexError, DEFAULT_BASE_URL};

#[cfg(test)]
pub use http::tests::MockHttpClient;
