//! Catalog of tables and formulas loaded from a definition file
//!
//! Accepts TOML or JSON documents of the shape
//!
//! ```toml
//! [[tables]]
//! name = "person"
//! columns = ["id", "name", "instance"]
//! primary = "id"
//! narrowColumn = "instance"
//!
//! [[formulas]]
//! name = "adults"
//! table = "person"
//! conditions = [{ column = "age", op = ">=", value = 18 }]
//! ```

use crate::error::SchemaError;
use crate::formula::{Formula, FormulaDef};
use crate::table::Table;
use indexmap::IndexMap;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CatalogDef {
    #[serde(default)]
    tables: Vec<Table>,
    #[serde(default)]
    formulas: Vec<FormulaDef>,
}

/// Named tables and formulas
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: IndexMap<String, Arc<Table>>,
    formulas: IndexMap<String, Arc<Formula>>,
}

impl Catalog {
    /// Empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML catalog
    ///
    /// # Errors
    /// `SchemaError::Parse` on malformed input, or any validation error of
    /// the contained definitions.
    pub fn from_toml_str(source: &str) -> Result<Self, SchemaError> {
        let def: CatalogDef =
            toml::from_str(source).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_def(def)
    }

    /// Parse a JSON catalog
    ///
    /// # Errors
    /// As [`Catalog::from_toml_str`].
    pub fn from_json_str(source: &str) -> Result<Self, SchemaError> {
        let def: CatalogDef =
            serde_json::from_str(source).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_def(def)
    }

    fn from_def(def: CatalogDef) -> Result<Self, SchemaError> {
        let mut catalog = Self::new();
        for table in def.tables {
            catalog.add_table(table)?;
        }
        for formula in def.formulas {
            let table = catalog.table(&formula.table)?;
            catalog.add_formula(formula.resolve(table)?)?;
        }
        Ok(catalog)
    }

    /// Register a table
    ///
    /// # Errors
    /// `SchemaError::DuplicateName` if a table of that name exists.
    pub fn add_table(&mut self, table: Table) -> Result<Arc<Table>, SchemaError> {
        if self.tables.contains_key(table.name()) {
            return Err(SchemaError::DuplicateName(table.name().to_string()));
        }
        let table = Arc::new(table);
        self.tables.insert(table.name().to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Register a formula
    ///
    /// # Errors
    /// `SchemaError::DuplicateName` if a formula of that name exists.
    pub fn add_formula(&mut self, formula: Formula) -> Result<Arc<Formula>, SchemaError> {
        if self.formulas.contains_key(formula.name()) {
            return Err(SchemaError::DuplicateName(formula.name().to_string()));
        }
        let formula = Arc::new(formula);
        self.formulas
            .insert(formula.name().to_string(), Arc::clone(&formula));
        Ok(formula)
    }

    /// Look up a table
    ///
    /// # Errors
    /// `SchemaError::UnknownTable`.
    pub fn table(&self, name: &str) -> Result<Arc<Table>, SchemaError> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))
    }

    /// Look up a formula
    ///
    /// # Errors
    /// `SchemaError::UnknownFormula`.
    pub fn formula(&self, name: &str) -> Result<Arc<Formula>, SchemaError> {
        self.formulas
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownFormula(name.to_string()))
    }

    /// All tables, in definition order
    pub fn tables(&self) -> impl Iterator<Item = &Arc<Table>> {
        self.tables.values()
    }
}
