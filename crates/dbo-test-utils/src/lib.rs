//! Testing utilities for the DBO workspace
//!
//! Shared fixtures: tables, a scripted automation context and a ready-made
//! façade over the in-memory store.

#![allow(missing_docs)]

use dbo_core::{
    AttributeLocator, AutomationContext, AutomationError, DboConfig, HierarchicalSettings,
    MemoryStorage, RecordFacade, Scope, Storage, ALWAYS_TEST_GENERATING_KEYS, NARROW_BY,
};
use dbo_schema::{Record, Table};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// `person(id, name, age, instance)`, narrowed on `instance`
pub fn person_table() -> Arc<Table> {
    Arc::new(
        Table::builder("person")
            .columns(["id", "name", "age", "instance"])
            .primary("id")
            .narrow_column("instance")
            .build()
            .unwrap(),
    )
}

/// `note(id, body)`, no narrow column
pub fn note_table() -> Arc<Table> {
    Arc::new(
        Table::builder("note")
            .columns(["id", "body"])
            .primary("id")
            .build()
            .unwrap(),
    )
}

/// `membership(person_id, club_id, instance)`, composite key
pub fn membership_table() -> Arc<Table> {
    Arc::new(
        Table::builder("membership")
            .columns(["person_id", "club_id", "instance"])
            .composite_primary(["person_id", "club_id"])
            .narrow_column("instance")
            .build()
            .unwrap(),
    )
}

/// Settings with `narrowBy` / `alwaysTestGeneratingKeys` at the root folder
pub fn settings(narrow_by: Option<&str>, always_test_generating_keys: bool) -> HierarchicalSettings {
    let mut settings = HierarchicalSettings::new();
    if let Some(value) = narrow_by {
        settings.set(&Scope::root(), NARROW_BY, value);
    }
    settings.set(
        &Scope::root(),
        ALWAYS_TEST_GENERATING_KEYS,
        always_test_generating_keys,
    );
    settings
}

/// Automation context answering from a fixed attribute table
#[derive(Debug, Default)]
pub struct FakeScreen {
    attributes: Mutex<HashMap<String, String>>,
    reads: Mutex<Vec<String>>,
}

impl FakeScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Screen with one attribute, keyed by its full locator
    pub fn with(self, locator: &str, value: &str) -> Self {
        self.attributes
            .lock()
            .insert(locator.to_string(), value.to_string());
        self
    }

    /// Locators read so far
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().clone()
    }
}

impl AutomationContext for FakeScreen {
    fn get_attribute(&self, locator: &AttributeLocator) -> Result<String, AutomationError> {
        let key = locator.to_string();
        self.reads.lock().push(key.clone());
        self.attributes
            .lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| AutomationError::ElementNotFound(locator.element().to_string()))
    }
}

/// Façade, its store and the registered tables
pub struct Harness {
    pub facade: RecordFacade,
    pub store: Arc<MemoryStorage>,
    pub person: Arc<Table>,
    pub note: Arc<Table>,
    pub membership: Arc<Table>,
}

impl Harness {
    /// Seed `person` rows directly in the store
    pub async fn seed_people(&self, rows: impl IntoIterator<Item = Record>) {
        for row in rows {
            self.store.insert(&self.person, &row).await.unwrap();
        }
    }
}

/// Build a [`Harness`] under the given settings
pub fn setup_facade(settings: HierarchicalSettings) -> Harness {
    let store = Arc::new(MemoryStorage::new());
    let person = person_table();
    let note = note_table();
    let membership = membership_table();
    for table in [&person, &note, &membership] {
        store.register(Arc::clone(table));
    }
    let facade = RecordFacade::new(
        Arc::clone(&store) as Arc<dyn Storage>,
        Arc::new(settings),
        DboConfig::new(),
    )
    .unwrap();
    Harness {
        facade,
        store,
        person,
        note,
        membership,
    }
}
