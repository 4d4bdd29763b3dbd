//! Aggregator and library configuration.

use serde::{Deserialize, Serialize};

/// Aggregator settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Maximum difference in percent or seconds still treated as "unchanged"
    pub tolerance: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self { tolerance: 1e-9 }
    }
}

/// Library service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Aggregator settings
    pub aggregator: AggregatorConfig,

    /// Commit the store after every successful command
    pub auto_commit: bool,

    /// Capacity of the worker mailbox
    pub mailbox_capacity: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            auto_commit: true,
            mailbox_capacity: 256,
        }
    }
}
