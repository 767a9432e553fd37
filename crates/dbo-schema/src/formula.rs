//! Formulas: reusable parameterized queries bound to one table

use crate::condition::Condition;
use crate::error::SchemaError;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// `ORDER BY` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: Direction,
}

/// A parameterized query over a single table
///
/// Matching against a formula narrows its own result set further: the
/// formula's fixed conditions always apply, the caller's pattern is added on
/// top of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    name: String,
    table: Arc<Table>,
    columns: Option<Vec<String>>,
    conditions: Vec<Condition>,
    order_by: Vec<OrderBy>,
}

impl Formula {
    /// Start building a formula over `table`
    #[inline]
    #[must_use]
    pub fn builder(name: impl Into<String>, table: Arc<Table>) -> FormulaBuilder {
        FormulaBuilder {
            name: name.into(),
            table,
            columns: None,
            conditions: Vec::new(),
            order_by: Vec::new(),
        }
    }

    /// Plain formula selecting every column of `table`
    #[must_use]
    pub fn of_table(table: Arc<Table>) -> Self {
        Self {
            name: table.name().to_string(),
            table,
            columns: None,
            conditions: Vec::new(),
            order_by: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table this formula is bound to
    #[inline]
    #[must_use]
    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Projected columns; `None` means all table columns
    #[inline]
    #[must_use]
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[inline]
    #[must_use]
    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }
}

/// Builder for [`Formula`]
#[derive(Debug, Clone)]
pub struct FormulaBuilder {
    name: String,
    table: Arc<Table>,
    columns: Option<Vec<String>>,
    conditions: Vec<Condition>,
    order_by: Vec<OrderBy>,
}

impl FormulaBuilder {
    /// Restrict the selected columns
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add a fixed condition
    #[inline]
    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add an ordering
    #[inline]
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    /// Validate every referenced column against the table
    ///
    /// # Errors
    /// `SchemaError::UnknownColumn` for the first undeclared column.
    pub fn build(self) -> Result<Formula, SchemaError> {
        let table = &self.table;
        let referenced = self
            .columns
            .iter()
            .flatten()
            .chain(self.conditions.iter().map(|c| &c.column))
            .chain(self.order_by.iter().map(|o| &o.column));
        for column in referenced {
            table.require_column(column)?;
        }

        Ok(Formula {
            name: self.name,
            table: self.table,
            columns: self.columns,
            conditions: self.conditions,
            order_by: self.order_by,
        })
    }
}

/// Serialized shape of a formula; the table is referenced by name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaDef {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
}

impl FormulaDef {
    /// Bind to a resolved table and validate
    ///
    /// # Errors
    /// As [`FormulaBuilder::build`].
    pub fn resolve(self, table: Arc<Table>) -> Result<Formula, SchemaError> {
        let mut builder = Formula::builder(self.name, table);
        builder.columns = self.columns;
        builder.conditions = self.conditions;
        builder.order_by = self.order_by;
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::CompareOp;

    fn table() -> Arc<Table> {
        Arc::new(
            Table::builder("item")
                .columns(["id", "label", "qty"])
                .primary("id")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn builds_with_known_columns() {
        let formula = Formula::builder("big", table())
            .columns(["id", "qty"])
            .condition(Condition::new("qty", CompareOp::Gt, 10))
            .order_by("qty", Direction::Desc)
            .build()
            .unwrap();
        assert_eq!(formula.table().name(), "item");
        assert_eq!(formula.conditions().len(), 1);
    }

    #[test]
    fn rejects_unknown_condition_column() {
        let err = Formula::builder("bad", table())
            .condition(Condition::equals("colour", "red"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownColumn {
                table: "item".into(),
                column: "colour".into()
            }
        );
    }

    #[test]
    fn rejects_unknown_projection() {
        assert!(Formula::builder("bad", table())
            .columns(["nope"])
            .build()
            .is_err());
    }
}
