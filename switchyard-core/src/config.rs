//! Routing configuration.

use std::time::Duration;

use crate::mode::ResolutionMode;

/// Process-wide routing configuration.
///
/// Built once at startup and handed to the resolver; there is no ambient
/// global lookup.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Operator-controlled resolution mode.
    pub mode: ResolutionMode,
    /// TTL for in-process cache entries.
    pub cache_ttl: Duration,
    /// Bound on in-process cache entries before LRU eviction.
    pub cache_capacity: usize,
    /// Whether the shared external cache tier participates in lookups.
    pub shared_cache_enabled: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: ResolutionMode::default(),
            cache_ttl: Duration::from_secs(60),
            cache_capacity: 10_000,
            shared_cache_enabled: true,
        }
    }
}

impl RoutingConfig {
    /// Create a routing configuration from environment variables.
    ///
    /// An unrecognized `SWITCHYARD_RESOLUTION_MODE` substitutes the most
    /// conservative mode (`force_legacy`) with a logged warning, never the
    /// most aggressive one.
    pub fn from_env() -> Self {
        let mode = match std::env::var("SWITCHYARD_RESOLUTION_MODE") {
            Ok(raw) => Self::parse_mode_or_safe_default(&raw),
            Err(_) => ResolutionMode::default(),
        };

        Self {
            mode,
            cache_ttl: Duration::from_secs(
                std::env::var("SWITCHYARD_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            cache_capacity: std::env::var("SWITCHYARD_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
            shared_cache_enabled: std::env::var("SWITCHYARD_SHARED_CACHE_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        }
    }

    /// Parse an operator-supplied mode string, substituting the safe
    /// default on unrecognized input.
    pub fn parse_mode_or_safe_default(raw: &str) -> ResolutionMode {
        match raw.parse::<ResolutionMode>() {
            Ok(mode) => mode,
            Err(err) => {
                tracing::warn!(
                    value = raw,
                    fallback = ResolutionMode::SAFE_DEFAULT.as_str(),
                    "unrecognized resolution mode, substituting conservative default: {err}"
                );
                ResolutionMode::SAFE_DEFAULT
            }
        }
    }

    pub fn with_mode(mut self, mode: ResolutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_shared_cache_enabled(mut self, enabled: bool) -> Self {
        self.shared_cache_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RoutingConfig::default();
        assert_eq!(config.mode, ResolutionMode::Auto);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.cache_capacity, 10_000);
        assert!(config.shared_cache_enabled);
    }

    #[test]
    fn test_unrecognized_mode_substitutes_force_legacy() {
        assert_eq!(
            RoutingConfig::parse_mode_or_safe_default("yolo"),
            ResolutionMode::ForceLegacy
        );
    }

    #[test]
    fn test_recognized_mode_parses() {
        assert_eq!(
            RoutingConfig::parse_mode_or_safe_default("dual_write_read_complete"),
            ResolutionMode::DualWriteReadComplete
        );
    }

    #[test]
    fn test_builder_methods() {
        let config = RoutingConfig::default()
            .with_mode(ResolutionMode::Off)
            .with_cache_ttl(Duration::from_secs(5))
            .with_cache_capacity(32)
            .with_shared_cache_enabled(false);
        assert_eq!(config.mode, ResolutionMode::Off);
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
        assert_eq!(config.cache_capacity, 32);
        assert!(!config.shared_cache_enabled);
    }
}
