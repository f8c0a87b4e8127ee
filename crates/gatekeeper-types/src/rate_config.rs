use serde::{Deserialize, Serialize};

/// Token bucket parameters for one route
///
/// Serialized as `{"capacity": .., "refillRate": ..}`, the value format of the
/// `rate_limits_config` hash.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateConfig {
    /// Maximum tokens the bucket can hold
    pub capacity: f64,
    /// Tokens restored per second
    pub refill_rate: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("capacity and refillRate must be positive finite numbers (got {capacity}, {refill_rate})")]
pub struct InvalidRateConfig {
    pub capacity: f64,
    pub refill_rate: f64,
}

impl RateConfig {
    pub fn new(capacity: f64, refill_rate: f64) -> Result<Self, InvalidRateConfig> {
        let config = Self {
            capacity,
            refill_rate,
        };
        if config.is_valid() {
            Ok(config)
        } else {
            Err(InvalidRateConfig {
                capacity,
                refill_rate,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        is_positive(self.capacity) && is_positive(self.refill_rate)
    }

    /// Whether a full bucket holds enough tokens for a request of `cost`
    pub fn admits(&self, cost: f64) -> bool {
        self.capacity >= cost
    }

    /// Seconds an empty bucket needs to fill up completely
    pub fn fill_time_secs(&self) -> f64 {
        self.capacity / self.refill_rate
    }

    /// Expiration of bucket keys: two full refill cycles, in milliseconds (at least 1)
    pub fn bucket_ttl_ms(&self) -> u64 {
        let ttl = (self.fill_time_secs() * 2.0 * 1000.0).ceil();
        if ttl.is_finite() && ttl >= 1.0 {
            ttl as u64
        } else {
            1
        }
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(RateConfig::new(5.0, 1.0).is_ok());
        assert!(RateConfig::new(0.0, 1.0).is_err());
        assert!(RateConfig::new(5.0, -1.0).is_err());
        assert!(RateConfig::new(f64::NAN, 1.0).is_err());
        assert!(RateConfig::new(5.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_admits_only_costs_within_capacity() {
        let config = RateConfig::new(0.5, 1.0).unwrap();
        assert!(!config.admits(1.0));

        let config = RateConfig::new(1.0, 1.0).unwrap();
        assert!(config.admits(1.0));
        assert!(!config.admits(1.5));
    }

    #[test]
    fn test_bucket_ttl_is_two_refill_cycles() {
        let config = RateConfig::new(5.0, 1.0).unwrap();
        assert_eq!(config.bucket_ttl_ms(), 10_000);

        let config = RateConfig::new(2.0, 0.5).unwrap();
        assert_eq!(config.bucket_ttl_ms(), 8_000);

        // Tiny buckets still expire after at least one millisecond
        let config = RateConfig::new(0.0001, 1000.0).unwrap();
        assert_eq!(config.bucket_ttl_ms(), 1);
    }

    #[test]
    fn test_json_field_names() {
        let config = RateConfig::new(2.0, 0.5).unwrap();
        let json = serde_json::to_value(config).unwrap();
        assert_eq!(json["capacity"], 2.0);
        assert_eq!(json["refillRate"], 0.5);

        let parsed: RateConfig =
            serde_json::from_str(r#"{"capacity":5,"refillRate":1}"#).unwrap();
        assert_eq!(parsed, RateConfig::new(5.0, 1.0).unwrap());
    }
}
