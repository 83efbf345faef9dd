//! Multi-row upsert statements.
//!
//! The statement text only depends on the number of rows, so its fixed parts
//! (column list, row placeholder, conflict clause) are rendered once per saver
//! and reassembled for every flush. Values are always bound positionally.

use crate::error_handling::DatabaseError;
use crate::schema::accessor::{extract_row, FieldAccessor};
use crate::sink::{Dialect, RelationalSink};

use super::FlushResult;

/// Quotes an identifier with backticks, doubling embedded backticks.
///
/// Both MySQL and SQLite accept backtick-quoted identifiers, which keeps
/// reserved words such as `order` or `key` usable as column names.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Pre-rendered pieces of a saver's upsert statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpsertTemplate {
    head: String,
    row: String,
    tail: String,
    rows_per_statement: usize,
}

impl UpsertTemplate {
    /// Renders the statement parts.
    ///
    /// The conflict clause is present only when `unique_keys` is non-empty and
    /// at least one column is left to update. Unique-key columns and the
    /// auto-increment column are never updated.
    pub fn new(
        dialect: Dialect,
        table: &str,
        columns: &[String],
        unique_keys: &[String],
        auto_increment: Option<&str>,
    ) -> Self {
        let quoted: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        let head = format!(
            "INSERT INTO {} ({}) VALUES ",
            quote_identifier(table),
            quoted.join(",")
        );
        let row = format!("({})", vec!["?"; columns.len()].join(","));

        let updates: Vec<&String> = columns
            .iter()
            .filter(|c| !unique_keys.contains(c) && Some(c.as_str()) != auto_increment)
            .collect();
        let tail = if unique_keys.is_empty() || updates.is_empty() {
            String::new()
        } else {
            match dialect {
                Dialect::MySql => {
                    let sets: Vec<String> = updates
                        .iter()
                        .map(|c| {
                            let q = quote_identifier(c);
                            format!("{}=VALUES({})", q, q)
                        })
                        .collect();
                    format!(" ON DUPLICATE KEY UPDATE {}", sets.join(", "))
                }
                Dialect::Sqlite => {
                    let keys: Vec<String> = unique_keys.iter().map(|k| quote_identifier(k)).collect();
                    let sets: Vec<String> = updates
                        .iter()
                        .map(|c| {
                            let q = quote_identifier(c);
                            format!("{}=excluded.{}", q, q)
                        })
                        .collect();
                    format!(
                        " ON CONFLICT ({}) DO UPDATE SET {}",
                        keys.join(","),
                        sets.join(", ")
                    )
                }
            }
        };

        UpsertTemplate {
            head,
            row,
            tail,
            rows_per_statement: (dialect.max_bind_params() / columns.len().max(1)).max(1),
        }
    }

    /// Statement text for `rows` rows.
    pub fn sql(&self, rows: usize) -> String {
        let mut sql = String::with_capacity(
            self.head.len() + rows * (self.row.len() + 1) + self.tail.len(),
        );
        sql.push_str(&self.head);
        for i in 0..rows {
            if i > 0 {
                sql.push(',');
            }
            sql.push_str(&self.row);
        }
        sql.push_str(&self.tail);
        sql
    }

    /// Most rows one statement can carry within the dialect's bind limit.
    pub fn rows_per_statement(&self) -> usize {
        self.rows_per_statement
    }
}

/// A write that stopped part-way through a batch.
#[derive(Debug)]
pub(crate) struct UpsertFailure {
    /// Leading rows already committed by earlier statements
    pub written: FlushResult,
    pub source: DatabaseError,
}

/// Writes `records` through `sink`, splitting only where the bind limit
/// requires it. Stops at the first failing statement.
pub(crate) async fn execute_upsert<T>(
    sink: &dyn RelationalSink,
    template: &UpsertTemplate,
    accessors: &[Option<FieldAccessor<T>>],
    records: &[T],
) -> Result<FlushResult, UpsertFailure> {
    let mut written = FlushResult::default();
    for chunk in records.chunks(template.rows_per_statement()) {
        let mut args = Vec::with_capacity(chunk.len() * accessors.len());
        for record in chunk {
            extract_row(accessors, record, &mut args);
        }
        if let Err(source) = sink.execute(&template.sql(chunk.len()), args).await {
            return Err(UpsertFailure { written, source });
        }
        written.rows += chunk.len();
        written.statements += 1;
    }
    Ok(written)
}
