//! Error types for schema definitions and match patterns

/// Invalid table, formula or catalog definition
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// Table declares no columns
    #[error("table '{table}' declares no columns")]
    NoColumns { table: String },

    /// Column declared twice
    #[error("table '{table}' declares column '{column}' more than once")]
    DuplicateColumn { table: String, column: String },

    /// Column referenced but not declared
    #[error("table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },

    /// No primary key given
    #[error("table '{table}' has no primary key")]
    MissingPrimaryKey { table: String },

    /// Composite primary key with no columns
    #[error("table '{table}' has an empty composite primary key")]
    EmptyPrimaryKey { table: String },

    /// Catalog lookup failed
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// Catalog lookup failed
    #[error("unknown formula '{0}'")]
    UnknownFormula(String),

    /// Name declared twice in a catalog
    #[error("'{0}' is defined more than once")]
    DuplicateName(String),

    /// Definition file could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

/// Pattern derivation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    /// Input keys that are neither declared columns nor control keys
    #[error("fields {unknown:?} are not columns of table '{table}'")]
    SchemaMismatch { table: String, unknown: Vec<String> },

    /// Input names both a table and a formula
    #[error("input names both a table and a formula")]
    ConflictingSource,

    /// Control key present with a non-boolean value
    #[error("control field '{key}' must be a boolean")]
    InvalidFlag { key: String },

    /// Input value is not a scalar
    #[error("field '{column}' must be a scalar value")]
    NonScalarValue { column: String },
}
