//! Runtime Configuration
//!
//! The runtime preallocates its arenas from a [`RuntimeConfig`]. The defaults
//! suit small graphs; applications that build thousands of memos up front can
//! raise the capacities to avoid rehashing while the graph is assembled.

/// Capacities used when the per-thread runtime builds its arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RuntimeConfig {
    /// Initial number of signal and memo slots.
    pub source_capacity: usize,

    /// Initial number of dependency node slots.
    pub node_capacity: usize,

    /// Initial capacity of the batch queue.
    pub batch_capacity: usize,
}

impl RuntimeConfig {
    /// Set the initial source capacity.
    #[must_use]
    pub fn with_source_capacity(mut self, capacity: usize) -> Self {
        self.source_capacity = capacity;
        self
    }

    /// Set the initial dependency node capacity.
    #[must_use]
    pub fn with_node_capacity(mut self, capacity: usize) -> Self {
        self.node_capacity = capacity;
        self
    }

    /// Set the initial batch queue capacity.
    #[must_use]
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            source_capacity: 64,
            node_capacity: 128,
            batch_capacity: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = RuntimeConfig::default()
            .with_source_capacity(10)
            .with_node_capacity(20);

        assert_eq!(config.source_capacity, 10);
        assert_eq!(config.node_capacity, 20);
        assert_eq!(config.batch_capacity, RuntimeConfig::default().batch_capacity);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_deserializes_with_missing_fields() {
        let config: RuntimeConfig = serde_json::from_str(r#"{ "node_capacity": 512 }"#).unwrap();
        assert_eq!(config.node_capacity, 512);
        assert_eq!(config.source_capacity, 64);
    }
}
