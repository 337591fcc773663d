//! Health entry analytics.
//!
//! Dated entries carry two free-form metric buckets. [`series::build_series`]
//! normalizes them into per-metric numeric series, and
//! [`analytics::derive_analytics`] turns those into rolling averages, trends,
//! threshold alerts and streak banners. [`binfit`] holds a small, unrelated
//! box-selection heuristic. The storage and CLI layers live in [`db`],
//! [`source`], [`report`] and the binary.

pub mod analytics;
pub mod binfit;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod plain;
pub mod report;
pub mod series;
pub mod source;
pub mod thresholds;

pub use analytics::{derive_analytics, AnalyticsOptions};
pub use plain::{map_to_plain_object, ToPlainMapping};
pub use series::build_series;
pub use thresholds::{default_thresholds, merge_thresholds};
