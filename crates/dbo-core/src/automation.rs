//! Automation context seam and key sources
//!
//! The façade never evaluates locators itself; it hands an
//! [`AttributeLocator`] to the caller's [`AutomationContext`] or runs a
//! caller-supplied extraction function against it.

use dbo_schema::Value;
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Errors raised while capturing a key from the automation context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutomationError {
    /// Locator lacks the `@attribute` suffix
    #[error("invalid attribute locator '{0}': expected <element>@<attribute>")]
    InvalidLocator(String),

    /// No element for the locator
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Element found without the attribute
    #[error("element '{element}' has no attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    /// Extraction function failed
    #[error("key extraction failed: {0}")]
    Extraction(String),
}

/// `<element locator>@<attribute name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeLocator {
    element: String,
    attribute: String,
}

impl AttributeLocator {
    /// Element part
    #[inline]
    #[must_use]
    pub fn element(&self) -> &str {
        &self.element
    }

    /// Attribute part
    #[inline]
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl FromStr for AttributeLocator {
    type Err = AutomationError;

    /// Splits on the last `@`, so element locators may contain `@` themselves
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('@') {
            Some((element, attribute)) if !element.is_empty() && !attribute.is_empty() => {
                Ok(Self {
                    element: element.to_string(),
                    attribute: attribute.to_string(),
                })
            }
            _ => Err(AutomationError::InvalidLocator(s.to_string())),
        }
    }
}

impl Display for AttributeLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.element, self.attribute)
    }
}

/// Live UI the engine is driving
pub trait AutomationContext: Send + Sync {
    /// Read an attribute of the located element
    fn get_attribute(&self, locator: &AttributeLocator) -> Result<String, AutomationError>;
}

/// Caller-supplied key extraction
pub type KeyExtractor =
    Arc<dyn Fn(&dyn AutomationContext) -> Result<Value, AutomationError> + Send + Sync>;

/// Where a captured primary key comes from
#[derive(Clone)]
pub enum KeySource {
    /// Attribute of a rendered element
    Locator(AttributeLocator),
    /// Function over the automation context
    Extractor(KeyExtractor),
}

impl KeySource {
    /// Parse an attribute locator
    ///
    /// # Errors
    /// `AutomationError::InvalidLocator` when there is no `@attribute` part.
    pub fn locator(locator: &str) -> Result<Self, AutomationError> {
        Ok(Self::Locator(locator.parse()?))
    }

    /// Wrap an extraction function
    #[must_use]
    pub fn extractor<F>(f: F) -> Self
    where
        F: Fn(&dyn AutomationContext) -> Result<Value, AutomationError> + Send + Sync + 'static,
    {
        Self::Extractor(Arc::new(f))
    }

    /// Obtain the captured value
    ///
    /// # Errors
    /// Whatever the context or extraction function reports.
    pub fn capture(&self, context: &dyn AutomationContext) -> Result<Value, AutomationError> {
        match self {
            KeySource::Locator(locator) => context.get_attribute(locator).map(Value::Text),
            KeySource::Extractor(extract) => extract(context),
        }
    }
}

impl Debug for KeySource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Locator(locator) => f.debug_tuple("Locator").field(locator).finish(),
            KeySource::Extractor(_) => f.write_str("Extractor(..)"),
        }
    }
}
