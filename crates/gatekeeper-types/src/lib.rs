//! Shared domain types for the gatekeeper gateway.
//!
//! - [`Identity`]: the verified caller, used as bucket partition key and
//!   propagated downstream
//! - [`RateConfig`]: per-route bucket parameters
//! - [`BucketKeys`]: the two Shared Token Store keys that hold one bucket

mod bucket;
mod identity;
mod rate_config;

pub use bucket::BucketKeys;
pub use identity::Identity;
pub use rate_config::{InvalidRateConfig, RateConfig};
