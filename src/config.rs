//! Configuration for the pipeline core.
//!
//! Configuration is supplied as JSON (loaded by the CLI) or built directly
//! with `Config::default()` / `CacheConfig::new`. This mirrors the teacher
//! crate's `Config`/`CacheConfig` structures: per-field `#[serde(default =
//! "...")]` so a partial JSON document only overrides what it mentions.

use serde::Deserialize;

use crate::common::ConfigError;

mod defaults {
    pub const MEMORY_SIZE: usize = 1 << 20;
    pub const CACHE_SIZE: usize = 1024;
    pub const BLOCK_SIZE: usize = 16;
    pub const WAYS: usize = 2;
    pub const MISS_LATENCY: u64 = 10;
    pub const START_PC: u64 = 0;
}

fn is_power_of_two(n: u64) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

/// Per-cache configuration: `{cache_size, block_size, ways, miss_latency}`.
///
/// `cache_size`, `block_size`, and `ways` must each be a positive power of
/// two (`spec.md` §3); `block_size` may be 1 (zero offset bits) and `ways`
/// may exceed the number of blocks, in which case the derived set count is
/// zero and every access is defined to miss (`spec.md` §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Total cache capacity in bytes.
    #[serde(default = "CacheConfig::default_cache_size")]
    pub cache_size: usize,
    /// Bytes per block (cache line).
    #[serde(default = "CacheConfig::default_block_size")]
    pub block_size: usize,
    /// Associativity (ways per set).
    #[serde(default = "CacheConfig::default_ways")]
    pub ways: usize,
    /// Additional cycles the pipeline is frozen after a miss.
    #[serde(default = "CacheConfig::default_miss_latency")]
    pub miss_latency: u64,
}

impl CacheConfig {
    fn default_cache_size() -> usize {
        defaults::CACHE_SIZE
    }
    fn default_block_size() -> usize {
        defaults::BLOCK_SIZE
    }
    fn default_ways() -> usize {
        defaults::WAYS
    }
    fn default_miss_latency() -> u64 {
        defaults::MISS_LATENCY
    }

    /// Validates and constructs a `CacheConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `cache_size`, `block_size`, or `ways` is
    /// not a positive power of two.
    pub fn new(
        cache_size: usize,
        block_size: usize,
        ways: usize,
        miss_latency: u64,
    ) -> Result<Self, ConfigError> {
        let cfg = Self {
            cache_size,
            block_size,
            ways,
            miss_latency,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks `cache_size`/`block_size`/`ways` are each a positive power of
    /// two, without constructing a new value.
    ///
    /// A config produced by [`serde::Deserialize`] (e.g. from a CLI
    /// `--config` file) skips [`CacheConfig::new`] entirely, so the CLI
    /// front end calls this explicitly before handing the config to
    /// [`crate::pipeline::Controller::init`] (`spec.md` §3's "all three
    /// configuration values are positive powers of two").
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_power_of_two(self.cache_size as u64) {
            return Err(ConfigError {
                field: "cache_size",
                value: self.cache_size as u64,
            });
        }
        if !is_power_of_two(self.block_size as u64) {
            return Err(ConfigError {
                field: "block_size",
                value: self.block_size as u64,
            });
        }
        if !is_power_of_two(self.ways as u64) {
            return Err(ConfigError {
                field: "ways",
                value: self.ways as u64,
            });
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_size: defaults::CACHE_SIZE,
            block_size: defaults::BLOCK_SIZE,
            ways: defaults::WAYS,
            miss_latency: defaults::MISS_LATENCY,
        }
    }
}

/// Root configuration for a simulation run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Instruction cache configuration.
    #[serde(default)]
    pub i_cache: CacheConfig,
    /// Data cache configuration.
    #[serde(default)]
    pub d_cache: CacheConfig,
    /// Backing memory size in bytes; any access `>= memory_size` faults.
    #[serde(default = "Config::default_memory_size")]
    pub memory_size: usize,
    /// Initial value of `pc` at `init`.
    #[serde(default = "Config::default_start_pc")]
    pub start_pc: u64,
}

impl Config {
    fn default_memory_size() -> usize {
        defaults::MEMORY_SIZE
    }
    fn default_start_pc() -> u64 {
        defaults::START_PC
    }

    /// Validates both cache configurations.
    ///
    /// `Deserialize` builds a `Config` field-by-field and never calls
    /// [`CacheConfig::new`], so a JSON document with, say, `"ways": 3` would
    /// otherwise reach [`crate::pipeline::Controller::init`] unchecked. The
    /// CLI calls this right after loading a config file.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found, checking `i_cache` before
    /// `d_cache`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.i_cache.validate()?;
        self.d_cache.validate()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            i_cache: CacheConfig::default(),
            d_cache: CacheConfig::default(),
            memory_size: defaults::MEMORY_SIZE,
            start_pc: defaults::START_PC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_well_formed() {
        let cfg = Config::default();
        assert!(is_power_of_two(cfg.i_cache.cache_size as u64));
        assert!(is_power_of_two(cfg.d_cache.block_size as u64));
    }

    #[test]
    fn rejects_non_power_of_two_ways() {
        let err = CacheConfig::new(1024, 16, 3, 10).unwrap_err();
        assert_eq!(err.field, "ways");
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let json = r#"{ "memory_size": 4096 }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.memory_size, 4096);
        assert_eq!(cfg.i_cache.cache_size, defaults::CACHE_SIZE);
    }

    #[test]
    fn validate_catches_malformed_ways_from_deserialized_json() {
        let json = r#"{ "d_cache": { "ways": 3 } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.field, "ways");
    }

    #[test]
    fn validate_accepts_the_default_config() {
        assert!(Config::default().validate().is_ok());
    }
}
