//! Façade configuration

use crate::error::DboError;
use crate::settings::Scope;
use crate::variables::INSERTED_RECORD_KEY;
use serde::{Deserialize, Serialize};

/// DBO configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DboConfig {
    /// Folder the settings lookups are scoped to
    pub scope: Scope,
    /// Slot receiving the key generated by the last insert
    pub inserted_key_variable: String,
}

impl DboConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With settings scope
    #[inline]
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// With inserted-key slot name
    #[inline]
    #[must_use]
    pub fn with_inserted_key_variable(mut self, name: impl Into<String>) -> Self {
        self.inserted_key_variable = name.into();
        self
    }

    /// Parse from TOML
    ///
    /// # Errors
    /// `DboError::Config` on malformed input or an empty slot name.
    pub fn from_toml_str(source: &str) -> Result<Self, DboError> {
        let config: Self = toml::from_str(source).map_err(|e| DboError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants
    ///
    /// # Errors
    /// `DboError::Config` when the inserted-key slot name is empty.
    pub fn validate(&self) -> Result<(), DboError> {
        if self.inserted_key_variable.trim().is_empty() {
            return Err(DboError::Config(
                "insertedKeyVariable must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DboConfig {
    fn default() -> Self {
        Self {
            scope: Scope::root(),
            inserted_key_variable: INSERTED_RECORD_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DboConfig::new();
        assert!(config.scope.is_root());
        assert_eq!(config.inserted_key_variable, "insertedRecordKey");
    }

    #[test]
    fn parses_toml() {
        let config = DboConfig::from_toml_str(
            r#"
scope = "/suite/login"
insertedKeyVariable = "lastKey"
"#,
        )
        .unwrap();
        assert_eq!(config.scope.to_string(), "/suite/login");
        assert_eq!(config.inserted_key_variable, "lastKey");
    }

    #[test]
    fn missing_fields_fall_back() {
        let config = DboConfig::from_toml_str("").unwrap();
        assert_eq!(config, DboConfig::default());
    }

    #[test]
    fn rejects_empty_slot_name() {
        assert!(matches!(
            DboConfig::from_toml_str(r#"insertedKeyVariable = " ""#),
            Err(DboError::Config(_))
        ));
    }
}
