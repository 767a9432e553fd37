//! DBO Schema
//!
//! Data model for the record façade: tables, formulas, records and the
//! pattern matcher that validates match input against a table.
//!
//! # Overview
//!
//! - **Table**: declared column set, primary key shape, optional narrow column
//! - **Formula**: parameterized query bound to exactly one table
//! - **Record**: ordered column → [`Value`] mapping
//! - **PatternMatcher**: pure `(schema, input) → MatchPattern` validation
//!
//! # Example
//!
//! ```rust
//! use dbo_schema::{PatternMatcher, Table};
//! use serde_json::json;
//!
//! let table = Table::builder("person")
//!     .columns(["id", "name"])
//!     .primary("id")
//!     .build()
//!     .unwrap();
//!
//! let input = json!({"name": "Ann", "sync": true});
//! let derived = PatternMatcher::new()
//!     .derive(&table, input.as_object().unwrap())
//!     .unwrap();
//! assert_eq!(derived.pattern.len(), 1);
//! assert!(derived.flags.sync);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod catalog;
pub mod condition;
pub mod error;
pub mod formula;
pub mod pattern;
pub mod record;
pub mod table;
pub mod value;

// Re-exports
pub use catalog::Catalog;
pub use condition::{CompareOp, Condition};
pub use error::{MatchError, SchemaError};
pub use formula::{Direction, Formula, FormulaBuilder, FormulaDef, OrderBy};
pub use pattern::{
    DerivedMatch, MatchFlags, MatchPattern, PatternMatcher, CONTROL_KEYS, FORMULA_KEY, TABLE_KEY,
};
pub use record::{Record, RecordError};
pub use table::{PrimaryKey, Table, TableBuilder, TableDef};
pub use value::Value;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for schema work
    pub use crate::{
        Catalog, Condition, Formula, MatchPattern, PatternMatcher, PrimaryKey, Record, Table,
        Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
