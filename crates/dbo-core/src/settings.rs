//! Hierarchical settings and the narrowing policy
//!
//! Settings are stored per folder. A lookup starts at the caller's [`Scope`]
//! and walks up to the root; the most specific folder that defines the field
//! wins.

use dbo_schema::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Field naming the narrowing value for the current test-database instance
pub const NARROW_BY: &str = "narrowBy";

/// Field forcing generate-then-compare even when narrowing
pub const ALWAYS_TEST_GENERATING_KEYS: &str = "alwaysTestGeneratingKeys";

/// A boolean or string setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
}

impl SettingValue {
    /// Truthiness: `true`, or a non-empty string
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        match self {
            SettingValue::Bool(b) => *b,
            SettingValue::Text(s) => !s.is_empty(),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            SettingValue::Bool(_) => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

/// Folder path a lookup is scoped to, e.g. `/suite/login`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope {
    segments: Vec<String>,
}

impl Scope {
    /// The root folder
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Child folder
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }

    /// Parent folder; the root has none
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// This scope, then each ancestor up to and including the root
    pub fn lineage(&self) -> impl Iterator<Item = Scope> {
        std::iter::successors(Some(self.clone()), Scope::parent)
    }

    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for Scope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            segments: s
                .split('/')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

impl TryFrom<String> for Scope {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// Hierarchical settings lookup
pub trait SettingsResolver: Send + Sync {
    /// Value of `field` at `scope`, falling back to ancestor folders
    fn get_down_to_folder(&self, field: &str, scope: &Scope) -> Option<SettingValue>;
}

/// Settings load failures
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// In-memory folder tree of settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalSettings {
    #[serde(default)]
    folders: BTreeMap<Scope, BTreeMap<String, SettingValue>>,
}

impl HierarchicalSettings {
    /// Empty settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from TOML:
    ///
    /// ```toml
    /// [folders."/"]
    /// narrowBy = "instance-a"
    ///
    /// [folders."/suite/keys"]
    /// alwaysTestGeneratingKeys = true
    /// ```
    ///
    /// # Errors
    /// `SettingsError::Parse` on malformed input.
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(source)?)
    }

    /// Set a field on a folder
    pub fn set(&mut self, scope: &Scope, field: impl Into<String>, value: impl Into<SettingValue>) {
        self.folders
            .entry(scope.clone())
            .or_default()
            .insert(field.into(), value.into());
    }

    /// Builder-style [`HierarchicalSettings::set`]
    #[must_use]
    pub fn with(
        mut self,
        scope: &Scope,
        field: impl Into<String>,
        value: impl Into<SettingValue>,
    ) -> Self {
        self.set(scope, field, value);
        self
    }
}

impl SettingsResolver for HierarchicalSettings {
    fn get_down_to_folder(&self, field: &str, scope: &Scope) -> Option<SettingValue> {
        scope
            .lineage()
            .find_map(|folder| self.folders.get(&folder)?.get(field).cloned())
    }
}

/// Narrowing flags resolved for one scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrowingPolicy {
    pub narrow_by: Option<SettingValue>,
    pub always_test_generating_keys: bool,
}

impl NarrowingPolicy {
    /// Resolve both flags at `scope`
    #[must_use]
    pub fn resolve(resolver: &dyn SettingsResolver, scope: &Scope) -> Self {
        let policy = Self {
            narrow_by: resolver.get_down_to_folder(NARROW_BY, scope),
            always_test_generating_keys: resolver
                .get_down_to_folder(ALWAYS_TEST_GENERATING_KEYS, scope)
                .is_some_and(|v| v.is_set()),
        };
        tracing::debug!(%scope, ?policy, "resolved narrowing policy");
        policy
    }

    /// Narrowing is configured at this scope
    #[inline]
    #[must_use]
    pub fn is_narrowing(&self) -> bool {
        self.narrow_by.as_ref().is_some_and(SettingValue::is_set)
    }

    /// Value written to / matched against a table's narrow column
    #[must_use]
    pub fn narrow_value(&self) -> Option<Value> {
        self.narrow_by
            .as_ref()
            .and_then(SettingValue::as_text)
            .filter(|s| !s.is_empty())
            .map(Value::from)
    }

    /// Use the captured key verbatim instead of generating one
    #[inline]
    #[must_use]
    pub fn store_captured_key(&self) -> bool {
        self.is_narrowing() && !self.always_test_generating_keys
    }
}
