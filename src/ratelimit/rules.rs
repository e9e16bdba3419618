//! Per-key override rules.
//!
//! Rules are loaded from YAML and installed on a limiter as custom limits.
//! A rules file is either a mapping with an `overrides` list or the bare list:
//!
//! ```yaml
//! overrides:
//!   - key: api-key-1
//!     limit: 50
//!     window_ms: 30000
//!   - key: premium-user
//!     limit: 200
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Result, WardenError};

/// A set of override rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// Overrides in file order; a later rule for the same key wins
    #[serde(default)]
    overrides: Vec<OverrideRule>,
}

/// A custom limit for a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    /// The key this rule applies to
    pub key: String,
    /// Requests admitted per window
    pub limit: u64,
    /// Window length in milliseconds; the limiter's default when absent
    #[serde(default)]
    pub window_ms: Option<u64>,
}

impl OverrideRule {
    /// The configured window, if any.
    pub fn window(&self) -> Option<Duration> {
        self.window_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(WardenError::Config(format!(
                "override for '{}' has a zero limit",
                self.key
            )));
        }
        if self.window_ms == Some(0) {
            return Err(WardenError::Config(format!(
                "override for '{}' has a zero window",
                self.key
            )));
        }
        Ok(())
    }
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a rule set from rules, validating each.
    pub fn from_rules(overrides: Vec<OverrideRule>) -> Result<Self> {
        let rules = Self { overrides };
        rules.validate()?;
        Ok(rules)
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit overrides");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)?;

        // A bare list of overrides is accepted as well as the full mapping
        let rules = if document.is_sequence() {
            Self {
                overrides: serde_yaml::from_value(document)?,
            }
        } else {
            serde_yaml::from_value(document)?
        };

        rules.validate()?;
        Ok(rules)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &self.overrides {
            rule.validate()?;
            if !seen.insert(rule.key.as_str()) {
                warn!(key = %rule.key, "Duplicate override, the last one wins");
            }
        }
        Ok(())
    }

    /// The rules in file order.
    pub fn overrides(&self) -> &[OverrideRule] {
        &self.overrides
    }

    /// Find the effective rule for a key.
    pub fn find(&self, key: &str) -> Option<&OverrideRule> {
        self.overrides.iter().rev().find(|rule| rule.key == key)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Whether there are no rules.
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}
