use serde::{Deserialize, Serialize};

use relaybridge_model::RemovedUserPolicy;

use crate::error::{ConfigLoadError, Result};

/// Label/tag sync options (spec §4.I, §6: "prefix, removed-user policy,
/// concurrency").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSyncConfig {
    pub prefix: String,
    pub removed_user_policy: RemovedUserPolicy,
    pub concurrency: u8,
}

impl Default for LabelSyncConfig {
    fn default() -> Self {
        Self {
            prefix: "relaybridge".into(),
            removed_user_policy: RemovedUserPolicy::Keep,
            concurrency: 4,
        }
    }
}

impl LabelSyncConfig {
    /// Validates the bounded concurrency range spec §4.I requires (1-20).
    pub fn validate(&self) -> Result<()> {
        if !(1..=20).contains(&self.concurrency) {
            return Err(ConfigLoadError::InvalidLabelSyncConcurrency(self.concurrency));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_concurrency() {
        let mut config = LabelSyncConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());
        config.concurrency = 21;
        assert!(config.validate().is_err());
        config.concurrency = 20;
        assert!(config.validate().is_ok());
    }
}
