//! Storage seam
//!
//! [`Storage`] is the black-box relational store the façade sits on. A
//! backend that only speaks SQL implements [`Storage::execute`] and
//! [`Storage::insert`]; the default [`Storage::select`] renders the
//! [`SelectQuery`] to parameterized SQL and routes it through `execute`.

mod memory;

pub use memory::{ExecuteHandler, MemoryStorage};

use dbo_schema::{Condition, Direction, Formula, OrderBy, Record, Table, Value};
use indexmap::IndexMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// Named SQL parameters (`:name`)
pub type Bindings = IndexMap<String, Value>;

/// Errors reported by a store; passed through unchanged
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// Constraint violation (unique, not null, ...)
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Connection failure
    #[error("connection failed: {0}")]
    Connection(String),

    /// Table not known to the store
    #[error("no such table: {0}")]
    UnknownTable(String),

    /// Statement rejected
    #[error("sql error: {0}")]
    Sql(String),

    /// Insert completed without reporting the generated key
    #[error("insert into '{table}' did not report a value for key '{column}'")]
    MissingGeneratedKey { table: String, column: String },
}

/// Rows returned by a store
///
/// Deduplication is the store's business: every row is taken to denote a
/// distinct record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    pub rows_affected: u64,
}

impl ResultSet {
    /// Result set from rows, deriving column names from the first row
    #[must_use]
    pub fn from_rows(rows: Vec<Record>) -> Self {
        let columns = rows
            .first()
            .map(|r| r.columns().map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            columns,
            rows,
            rows_affected: 0,
        }
    }

    /// Result of a statement that returns no rows
    #[inline]
    #[must_use]
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A select against one table, optionally shaped by a formula
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    target: String,
    table: Arc<Table>,
    columns: Option<Vec<String>>,
    conditions: Vec<Condition>,
    order_by: Vec<OrderBy>,
}

impl SelectQuery {
    /// Every row of `table`
    #[must_use]
    pub fn table(table: Arc<Table>) -> Self {
        Self {
            target: table.name().to_string(),
            table,
            columns: None,
            conditions: Vec::new(),
            order_by: Vec::new(),
        }
    }

    /// The formula's projection, fixed conditions and ordering
    #[must_use]
    pub fn formula(formula: &Formula) -> Self {
        Self {
            target: formula.name().to_string(),
            table: Arc::clone(formula.table()),
            columns: formula.columns().map(<[String]>::to_vec),
            conditions: formula.conditions().to_vec(),
            order_by: formula.order_by().to_vec(),
        }
    }

    /// Add a condition (AND)
    #[inline]
    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Table or formula name, for diagnostics
    #[inline]
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline]
    #[must_use]
    pub fn table_ref(&self) -> &Arc<Table> {
        &self.table
    }

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

    /// Whether a row satisfies every condition
    #[must_use]
    pub fn matches(&self, row: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    /// Render as parameterized SQL with `:pN` bindings
    #[must_use]
    pub fn to_sql(&self) -> (String, Bindings) {
        let mut sql = String::from("SELECT ");
        match &self.columns {
            Some(columns) => {
                let quoted: Vec<String> = columns.iter().map(|c| quote(c)).collect();
                sql.push_str(&quoted.join(", "));
            }
            None => sql.push('*'),
        }
        let _ = write!(sql, " FROM {}", quote(self.table.name()));

        let mut bindings = Bindings::new();
        if !self.conditions.is_empty() {
            let mut clauses = Vec::with_capacity(self.conditions.len());
            for condition in &self.conditions {
                if condition.op.takes_value() {
                    let name = format!("p{}", bindings.len());
                    clauses.push(format!(
                        "{} {} :{}",
                        quote(&condition.column),
                        condition.op,
                        name
                    ));
                    bindings.insert(name, condition.value.clone());
                } else {
                    clauses.push(format!("{} {}", quote(&condition.column), condition.op));
                }
            }
            let _ = write!(sql, " WHERE {}", clauses.join(" AND "));
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|o| {
                    let direction = match o.direction {
                        Direction::Asc => "ASC",
                        Direction::Desc => "DESC",
                    };
                    format!("{} {}", quote(&o.column), direction)
                })
                .collect();
            let _ = write!(sql, " ORDER BY {}", order.join(", "));
        }

        (sql, bindings)
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Relational store consumed by the façade
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Raw SQL passthrough
    async fn execute(&self, sql: &str, bindings: &Bindings) -> Result<ResultSet, StorageError>;

    /// Run a select; rows are returned in store order
    async fn select(&self, query: &SelectQuery) -> Result<ResultSet, StorageError> {
        let (sql, bindings) = query.to_sql();
        tracing::trace!(%sql, "rendered select");
        self.execute(&sql, &bindings).await
    }

    /// Insert `record`; returns the stored row with any generated key populated
    async fn insert(&self, table: &Table, record: &Record) -> Result<Record, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbo_schema::CompareOp;
    use pretty_assertions::assert_eq;

    fn person() -> Arc<Table> {
        Arc::new(
            Table::builder("person")
                .columns(["id", "name", "age"])
                .primary("id")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn renders_plain_table_select() {
        let (sql, bindings) = SelectQuery::table(person()).to_sql();
        assert_eq!(sql, r#"SELECT * FROM "person""#);
        assert!(bindings.is_empty());
    }

    #[test]
    fn renders_formula_with_pattern() {
        let formula = Formula::builder("adults", person())
            .columns(["id", "name"])
            .condition(Condition::new("age", CompareOp::GtEq, 18))
            .condition(Condition::is_null("name"))
            .order_by("age", Direction::Desc)
            .build()
            .unwrap();
        let query = SelectQuery::formula(&formula).and(Condition::equals("id", 4));
        let (sql, bindings) = query.to_sql();
        assert_eq!(
            sql,
            r#"SELECT "id", "name" FROM "person" WHERE "age" >= :p0 AND "name" IS NULL AND "id" = :p1 ORDER BY "age" DESC"#
        );
        assert_eq!(bindings.get("p0"), Some(&Value::Integer(18)));
        assert_eq!(bindings.get("p1"), Some(&Value::Integer(4)));
        assert_eq!(query.target(), "adults");
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn result_set_columns_from_first_row() {
        let rs = ResultSet::from_rows(vec![Record::new().with("a", 1).with("b", 2)]);
        assert_eq!(rs.columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(rs.len(), 1);
    }
}
