use std::env;

use chrono::Duration;
use tracing::info;

use crate::NewswireError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Text intelligence (OpenAI-compatible)
    pub openai_api_key: String,

    // Feeds to ingest, comma-separated in FEED_URLS
    pub feed_urls: Vec<String>,

    // Clustering
    pub cluster: ClusterConfig,

    // Overall deadline for one ingestion run, in seconds
    pub run_deadline_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        let cluster = ClusterConfig {
            same_source_threshold: env_f64("SAME_SOURCE_SIM_THRESHOLD", 0.94),
            same_story_threshold: env_f64("SAME_STORY_SIM_THRESHOLD", 0.80),
            ..ClusterConfig::default()
        };
        if let Err(e) = cluster.validate() {
            panic!("invalid cluster config: {e}");
        }
        Self {
            database_url: required_env("DATABASE_URL"),
            openai_api_key: required_env("OPENAI_API_KEY"),
            feed_urls: env::var("FEED_URLS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            cluster,
            run_deadline_secs: env::var("RUN_DEADLINE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        }
    }

    /// Log the non-secret parts of the config at startup.
    pub fn log_redacted(&self) {
        info!(
            feeds = self.feed_urls.len(),
            same_source_threshold = self.cluster.same_source_threshold,
            same_story_threshold = self.cluster.same_story_threshold,
            run_deadline_secs = self.run_deadline_secs,
            "Config loaded"
        );
    }
}

/// Tunable knobs for the dedup/clustering decision engine. Thresholds are
/// similarity floors compared with strictly-greater, so a value sitting
/// exactly on a threshold never matches.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Floor for treating a same-outlet neighbor as a republication.
    pub same_source_threshold: f64,
    /// Floor for treating a different-outlet neighbor as the same story.
    pub same_story_threshold: f64,
    /// How far back a same-source republication can reach.
    pub same_source_window: Duration,
    /// Neighbors fetched per similarity lookup.
    pub top_k: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            same_source_threshold: 0.94,
            same_story_threshold: 0.80,
            same_source_window: Duration::hours(48),
            top_k: 5,
        }
    }
}

impl ClusterConfig {
    /// The same-source threshold catches near-identical text, not merely
    /// related text, so it must sit strictly above the same-story threshold.
    pub fn validate(&self) -> Result<(), NewswireError> {
        if self.same_source_threshold <= self.same_story_threshold {
            return Err(NewswireError::Config(format!(
                "same_source_threshold ({}) must be strictly greater than same_story_threshold ({})",
                self.same_source_threshold, self.same_story_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.same_story_threshold)
            || !(0.0..=1.0).contains(&self.same_source_threshold)
        {
            return Err(NewswireError::Config(
                "similarity thresholds must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ClusterConfig::default().validate().is_ok());
    }

    #[test]
    fn equal_thresholds_rejected() {
        let cfg = ClusterConfig {
            same_source_threshold: 0.8,
            same_story_threshold: 0.8,
            ..ClusterConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let cfg = ClusterConfig {
            same_source_threshold: 0.7,
            same_story_threshold: 0.9,
            ..ClusterConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let cfg = ClusterConfig {
            same_source_threshold: 1.4,
            same_story_threshold: 0.8,
            ..ClusterConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
