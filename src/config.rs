//! Runtime and distribution configuration.
//!
//! [`ContextConfig`] is read once when a [`Context`](crate::Context) is
//! initialized and fixes the execution mode for its whole lifetime.
//! [`Distribution`] is per container and fixed at construction.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{DrError, Result};

/// Environment variable selecting the execution mode (`host` or `device`).
pub const ENV_EXECUTION_MODE: &str = "DR_EXECUTION_MODE";
/// Environment variable selecting the accelerator queue width.
pub const ENV_ACCELERATOR_THREADS: &str = "DR_ACCELERATOR_THREADS";

/// Where container storage lives and where per-segment work executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Host memory, work runs on the calling rank's thread.
    #[default]
    Host,
    /// Accelerator-addressable memory, work runs on the accelerator queue.
    Device,
}

impl FromStr for ExecutionMode {
    type Err = DrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" | "cpu" => Ok(ExecutionMode::Host),
            "device" | "accelerator" | "gpu" => Ok(ExecutionMode::Device),
            other => Err(DrError::Config(format!("unknown execution mode `{other}`"))),
        }
    }
}

/// Per-rank context configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Execution mode, read once at initialization.
    pub mode: ExecutionMode,
    /// Worker threads of the accelerator queue; `0` lets the runtime decide.
    pub accelerator_threads: usize,
}

impl ContextConfig {
    /// Host-only configuration.
    pub const fn host() -> Self {
        Self {
            mode: ExecutionMode::Host,
            accelerator_threads: 0,
        }
    }

    /// Device configuration with an accelerator queue of `threads` workers.
    pub const fn device(threads: usize) -> Self {
        Self {
            mode: ExecutionMode::Device,
            accelerator_threads: threads,
        }
    }

    /// Parses a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`DrError::Config`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads [`ENV_EXECUTION_MODE`] and [`ENV_ACCELERATOR_THREADS`], falling
    /// back to the defaults for unset variables.
    ///
    /// # Errors
    /// Returns [`DrError::Config`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(mode) = std::env::var(ENV_EXECUTION_MODE) {
            config.mode = mode.parse()?;
        }
        if let Ok(threads) = std::env::var(ENV_ACCELERATOR_THREADS) {
            config.accelerator_threads = threads.trim().parse().map_err(|_| {
                DrError::Config(format!("{ENV_ACCELERATOR_THREADS}=`{threads}` is not a thread count"))
            })?;
        }
        Ok(config)
    }
}

/// Ghost-region widths around each segment.
///
/// `prev` elements before and `next` elements after the owned block replicate
/// the neighbors' boundary elements. With `periodic` set, the first and last
/// segments are neighbors of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HaloBounds {
    /// Ghost width before the owned block.
    pub prev: usize,
    /// Ghost width after the owned block.
    pub next: usize,
    /// Wrap neighbor computation at the domain edges.
    pub periodic: bool,
}

impl HaloBounds {
    /// Symmetric ghost width.
    pub const fn symmetric(radius: usize, periodic: bool) -> Self {
        Self {
            prev: radius,
            next: radius,
            periodic,
        }
    }

    /// Asymmetric ghost widths.
    pub const fn asymmetric(prev: usize, next: usize, periodic: bool) -> Self {
        Self {
            prev,
            next,
            periodic,
        }
    }

    /// Returns `true` if no ghost region is configured.
    pub const fn is_empty(&self) -> bool {
        self.prev == 0 && self.next == 0
    }

    /// Scales both widths, e.g. from rows to elements.
    pub const fn scaled(self, factor: usize) -> Self {
        Self {
            prev: self.prev * factor,
            next: self.next * factor,
            periodic: self.periodic,
        }
    }
}

/// Distribution configuration of a container.
///
/// ```rust
/// use dranges::Distribution;
///
/// let dist = Distribution::new().halo(1).periodic(true).granularity(4);
/// assert_eq!(dist.halo.prev, 1);
/// assert_eq!(dist.granularity, 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Distribution {
    /// Ghost-region configuration.
    pub halo: HaloBounds,
    /// Segment boundaries fall only on multiples of this value.
    pub granularity: usize,
}

impl Default for Distribution {
    fn default() -> Self {
        Self {
            halo: HaloBounds::default(),
            granularity: 1,
        }
    }
}

impl Distribution {
    /// Block distribution without ghosts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Symmetric ghost width, keeping the current periodicity.
    #[must_use]
    pub fn halo(mut self, radius: usize) -> Self {
        self.halo.prev = radius;
        self.halo.next = radius;
        self
    }

    /// Asymmetric ghost widths, keeping the current periodicity.
    #[must_use]
    pub fn halo_bounds(mut self, prev: usize, next: usize) -> Self {
        self.halo.prev = prev;
        self.halo.next = next;
        self
    }

    /// Wraps neighbor computation at the domain edges.
    #[must_use]
    pub fn periodic(mut self, periodic: bool) -> Self {
        self.halo.periodic = periodic;
        self
    }

    /// Restricts segment boundaries to multiples of `n`.
    #[must_use]
    pub fn granularity(mut self, n: usize) -> Self {
        self.granularity = n;
        self
    }

    /// Parses a distribution from JSON.
    ///
    /// # Errors
    /// Returns [`DrError::Config`] if the document is malformed or invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let dist: Self = serde_json::from_str(json)?;
        dist.validate()?;
        Ok(dist)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    /// Returns [`DrError::Config`] for a zero granularity.
    pub fn validate(&self) -> Result<()> {
        if self.granularity == 0 {
            return Err(DrError::Config("granularity must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_aliases() {
        assert_eq!("HOST".parse::<ExecutionMode>().unwrap(), ExecutionMode::Host);
        assert_eq!(" gpu ".parse::<ExecutionMode>().unwrap(), ExecutionMode::Device);
        assert!("tpu".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn context_config_from_json_fills_defaults() {
        let config = ContextConfig::from_json(r#"{ "mode": "device" }"#).unwrap();
        assert_eq!(config, ContextConfig::device(0));

        let config = ContextConfig::from_json("{}").unwrap();
        assert_eq!(config, ContextConfig::host());

        assert!(ContextConfig::from_json(r#"{ "mode": "quantum" }"#).is_err());
    }

    #[test]
    fn distribution_builder_and_json_agree() {
        let built = Distribution::new().halo_bounds(1, 2).periodic(true).granularity(3);
        let parsed = Distribution::from_json(
            r#"{ "halo": { "prev": 1, "next": 2, "periodic": true }, "granularity": 3 }"#,
        )
        .unwrap();
        assert_eq!(built, parsed);

        let json = serde_json::to_string(&built).unwrap();
        assert_eq!(Distribution::from_json(&json).unwrap(), built);
    }

    #[test]
    fn zero_granularity_is_rejected() {
        assert!(Distribution::new().granularity(0).validate().is_err());
        assert!(Distribution::from_json(r#"{ "granularity": 0 }"#).is_err());
    }

    #[test]
    fn halo_bounds_scale_to_elements() {
        let rows = HaloBounds::asymmetric(1, 2, false);
        assert_eq!(rows.scaled(8), HaloBounds::asymmetric(8, 16, false));
        assert!(HaloBounds::default().is_empty());
    }
}
