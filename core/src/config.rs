use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Webhooks ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Destination for "complaint created". `None` disables it.
    #[serde(default)]
    pub created_url: Option<String>,
    /// Destination for "complaint assigned". `None` disables it.
    #[serde(default)]
    pub assigned_url: Option<String>,
    /// Per-request budget; a slow endpoint is abandoned after this.
    pub timeout_ms: u64,
    /// Notifications waiting for the worker. Past this, new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// A notification that waited longer than this is dropped unsent.
    #[serde(default = "default_max_queue_wait_ms")]
    pub max_queue_wait_ms: u64,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_queue_wait_ms() -> u64 {
    30_000
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn max_queue_wait(&self) -> Duration {
        Duration::from_millis(self.max_queue_wait_ms)
    }
}

// ── Assignment ─────────────────────────────────────────────────────

/// How one contractor is picked when a nagar has several.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First contractor registered in the nagar.
    #[default]
    FirstMatch,
    /// Contractor whose most recent assignment is oldest; never-assigned first.
    LeastRecentlyAssigned,
}

/// Upper bound on open (assigned or in-progress) work per contractor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    #[default]
    Unlimited,
    MaxOpen(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    #[serde(default)]
    pub selection: SelectionPolicy,
    #[serde(default)]
    pub capacity: CapacityPolicy,
    /// Budget for the lookup-then-update pair. Past it the complaint stays pending.
    pub timeout_ms: u64,
}

impl AssignmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ── Delay / stats / store ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    pub threshold_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    pub top_cities: usize,
    pub top_categories: usize,
    pub cohort_weeks: u32,
    pub top_reporter_window_days: i64,
    pub recent_resolved: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub busy_timeout_ms: u64,
}

// ── Root ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub webhooks: WebhookConfig,
    pub assignment: AssignmentConfig,
    pub delay: DelayConfig,
    pub stats: StatsConfig,
    pub store: StoreConfig,
}

impl EngineConfig {
    /// Load from `{data_dir}/engine_config.json`.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/engine_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with webhooks disabled.
    pub fn default_test() -> Self {
        Self {
            webhooks: WebhookConfig {
                created_url: None,
                assigned_url: None,
                timeout_ms: 1_000,
                queue_capacity: default_queue_capacity(),
                max_queue_wait_ms: default_max_queue_wait_ms(),
            },
            assignment: AssignmentConfig {
                selection: SelectionPolicy::FirstMatch,
                capacity: CapacityPolicy::Unlimited,
                timeout_ms: 2_000,
            },
            delay: DelayConfig { threshold_days: 7 },
            stats: StatsConfig {
                top_cities: 5,
                top_categories: 8,
                cohort_weeks: 8,
                top_reporter_window_days: 7,
                recent_resolved: 5,
            },
            store: StoreConfig {
                busy_timeout_ms: 5_000,
            },
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.delay.threshold_days < 0 {
            anyhow::bail!("delay.threshold_days must be >= 0");
        }
        if self.stats.cohort_weeks == 0 {
            anyhow::bail!("stats.cohort_weeks must be >= 1");
        }
        if self.webhooks.queue_capacity == 0 {
            anyhow::bail!("webhooks.queue_capacity must be >= 1");
        }
        if let CapacityPolicy::MaxOpen(0) = self.assignment.capacity {
            anyhow::bail!("assignment.capacity max_open must be >= 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shipped_config() {
        let raw = include_str!("../../data/engine_config.json");
        let config: EngineConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.assignment.selection, SelectionPolicy::FirstMatch);
        assert_eq!(config.assignment.capacity, CapacityPolicy::Unlimited);
        assert_eq!(config.delay.threshold_days, 7);
        assert_eq!(config.stats.top_cities, 5);
        assert_eq!(config.stats.top_categories, 8);
        assert_eq!(config.webhooks.queue_capacity, 256);
        assert_eq!(config.webhooks.max_queue_wait(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn capacity_policy_accepts_max_open() {
        let policy: CapacityPolicy = serde_json::from_str(r#"{"max_open": 3}"#).unwrap();
        assert_eq!(policy, CapacityPolicy::MaxOpen(3));
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut config = EngineConfig::default_test();
        config.assignment.capacity = CapacityPolicy::MaxOpen(0);
        assert!(config.validate().is_err());
    }
}
