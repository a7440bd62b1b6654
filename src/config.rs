use crate::{Placement, PoolError};
use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sentinel for [`PoolConfig::max_idle`] meaning the idle pool has no bound.
pub const UNBOUNDED: usize = usize::MAX;

/// Construction-time configuration of a [`LocalPool`](crate::LocalPool).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    /// Placement passed to the allocator for every new instance.
    #[cfg_attr(feature = "serde", serde(default))]
    pub placement: Placement,
    /// Upper bound on idle instances, [`UNBOUNDED`] by default.
    #[cfg_attr(feature = "serde", serde(default = "unbounded"))]
    pub max_idle: usize,
}

#[cfg(feature = "serde")]
fn unbounded() -> usize {
    UNBOUNDED
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            placement: Placement::default(),
            max_idle: UNBOUNDED,
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_idle == 0 {
            return Err(PoolError::Configuration(
                "max_idle must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the idle pool is bounded.
    pub fn is_bounded(&self) -> bool {
        self.max_idle != UNBOUNDED
    }
}

/// Parameters of the recurring shrink performed by
/// [`LocalPool::spawn_shrink_loop`](crate::LocalPool::spawn_shrink_loop).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShrinkPolicy {
    /// Wait between two shrinks.
    pub interval: Duration,
    /// Share of idle instances kept by each shrink, clamped to `[0.0, 1.0]`.
    pub retain_ratio: f32,
    /// Idle instances always kept regardless of the ratio.
    pub min_size: usize,
    /// Run the before-rent hook on each instance before destroying it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub call_before_rent: bool,
}

impl Default for ShrinkPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            retain_ratio: 0.5,
            min_size: 0,
            call_before_rent: false,
        }
    }
}

impl ShrinkPolicy {
    /// Validate the policy, returning an error if invalid.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.interval.is_zero() {
            return Err(PoolError::Configuration(
                "shrink interval must be greater than zero".to_string(),
            ));
        }
        if self.retain_ratio.is_nan() {
            return Err(PoolError::Configuration(
                "retain_ratio must be a number".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_config_is_unbounded() {
        let config = PoolConfig::default();
        assert_eq!(config.max_idle, UNBOUNDED);
        assert!(!config.is_bounded());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_max_idle_is_rejected() {
        let config = PoolConfig {
            max_idle: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PoolError::Configuration(_))
        ));
    }

    #[test]
    fn shrink_policy_rejects_zero_interval_and_nan() {
        let zero = ShrinkPolicy {
            interval: Duration::ZERO,
            ..ShrinkPolicy::default()
        };
        assert!(zero.validate().is_err());

        let nan = ShrinkPolicy {
            retain_ratio: f32::NAN,
            ..ShrinkPolicy::default()
        };
        assert!(nan.validate().is_err());

        // Out-of-range ratios are clamped at use, not rejected.
        let wide = ShrinkPolicy {
            retain_ratio: 4.0,
            ..ShrinkPolicy::default()
        };
        assert!(wide.validate().is_ok());
    }
}
