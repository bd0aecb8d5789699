#![forbid(unsafe_code)]

pub mod aggregator;

pub use aggregator::{AnalyticsConfig, AnalyticsEngine, DerivedMetrics, StreamAnalyticsSnapshot, TimelineSample, ViewerSession};
