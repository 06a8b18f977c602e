//! ChainGuard predicts shipment delay risk from weather and port congestion.
//!
//! The crate covers the whole lifecycle: cleaning the raw shipment export,
//! mapping origins to reference ports, enriching with archived weather,
//! training a gradient-boosted classifier, and serving predictions over
//! HTTP. The persisted feature column order is the contract between training
//! and serving; see [`inference::FeatureAligner`].

pub mod api;
pub mod clients;
pub mod config;
pub mod data;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod ml;
pub mod models;
