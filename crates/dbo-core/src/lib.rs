//! DBO Core - record access for test automation
//!
//! A façade over a relational store exposing three primitives to an
//! automation engine:
//! - read exactly one record matching a pattern into a named slot
//! - insert a record, back-filling a generated single-column key
//! - insert a record whose key is captured from the UI, reconciled with the
//!   store's key generation under the narrowing policy
//!
//! plus raw SQL passthrough.
//!
//! # Example
//!
//! ```rust,no_run
//! use dbo_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), DboError> {
//! let table = Arc::new(
//!     Table::builder("person")
//!         .columns(["id", "name"])
//!         .primary("id")
//!         .build()?,
//! );
//! let store = Arc::new(MemoryStorage::new());
//! store.register(Arc::clone(&table));
//!
//! let facade = RecordFacade::new(store, Arc::new(HierarchicalSettings::new()), DboConfig::new())?;
//! let outcome = facade
//!     .insert_record(Record::new().with("name", "Ann"), Arc::clone(&table), true)
//!     .await
//!     .await?;
//! println!("generated key: {:?}", outcome.generated_key);
//!
//! let ann = facade
//!     .read_record_into(MatchRequest::new(table).with("name", "Ann").sync(), "ann")
//!     .await
//!     .await?;
//! # let _ = ann;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod automation;
pub mod completion;
pub mod config;
pub mod error;
pub mod facade;
pub mod inserter;
pub mod reconciler;
pub mod selector;
pub mod settings;
pub mod storage;
pub mod variables;

pub use automation::{AttributeLocator, AutomationContext, AutomationError, KeyExtractor, KeySource};
pub use completion::Completion;
pub use config::DboConfig;
pub use error::DboError;
pub use facade::RecordFacade;
pub use inserter::{InsertOutcome, RecordInserter};
pub use reconciler::{Compound, KeyReconciler};
pub use selector::{MatchRequest, MatchSource, RecordSelector};
pub use settings::{
    HierarchicalSettings, NarrowingPolicy, Scope, SettingValue, SettingsError, SettingsResolver,
    ALWAYS_TEST_GENERATING_KEYS, NARROW_BY,
};
pub use storage::{Bindings, MemoryStorage, ResultSet, SelectQuery, Storage, StorageError};
pub use variables::{StoredValue, StoredVariables, INSERTED_RECORD_KEY};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with DBO Core
    pub use crate::{
        Compound, Completion, DboConfig, DboError, HierarchicalSettings, KeySource,
        MatchRequest, MemoryStorage, RecordFacade, Scope, Storage,
    };
    pub use dbo_schema::{Catalog, Formula, Record, Table, Value};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
