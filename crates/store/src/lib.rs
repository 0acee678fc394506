//! Collaborator interfaces consumed by the turn pipeline, plus in-memory
//! reference implementations used by tests and the CLI.
//!
//! The pipeline core treats every collaborator here as replaceable: a real
//! deployment wires a storefront-backed catalog, a shared TTL cache, and a
//! commerce-platform coupon issuer behind these same traits.

pub mod analytics;
pub mod cache;
pub mod catalog;
pub mod coupons;
pub mod fixtures;

use thiserror::Error;

pub use analytics::{AnalyticsSink, NoopSink, RecordingSink, TracingSink, TurnEvent};
pub use cache::{InMemoryTtlCache, TtlCache};
pub use catalog::{CatalogStore, InMemoryCatalog};
pub use coupons::{CouponIssuer, InMemoryCouponIssuer};
pub use fixtures::demo_catalog;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("decode error: {0}")]
    Decode(String),
}
