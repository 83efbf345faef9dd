//! Precomputed field accessors.
//!
//! For every resolved column the saver keeps one `FieldAccessor`: the member
//! path inside the record and the getter found at the end of it. They are
//! built once when the saver is constructed; writing a batch then reads each
//! value with a single indirect call, without walking the shape again.
//!
//! A column with no resolvable member keeps its slot as `None` so that
//! values stay aligned with the column list; it is written as NULL.

use std::collections::HashMap;
use std::fmt;

use log::warn;

use super::resolve::{structural_columns, ResolvedColumns};
use super::{Reader, Record, RecordShape, SqlValue};

/// How to read one column's value out of a record.
pub struct FieldAccessor<T> {
    path: Vec<usize>,
    optional: bool,
    read: Reader<T>,
}

impl<T> FieldAccessor<T> {
    /// Member indices from the root of the record.
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Whether the field is an optional indirection (absent reads as NULL).
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Reads the column's value out of `record`.
    pub fn read(&self, record: &T) -> SqlValue {
        (self.read)(record)
    }
}

impl<T> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("path", &self.path)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

/// Builds accessors in column order.
///
/// Uses the introspection metadata when the columns came from it, otherwise
/// repeats the structural walk to recover each member's path.
pub fn build_accessors<T: Record>(
    shape: &RecordShape<T>,
    resolved: &ResolvedColumns,
) -> Vec<Option<FieldAccessor<T>>> {
    // column name -> (path, optional); first occurrence wins
    let mut paths: HashMap<String, (Vec<usize>, bool)> = HashMap::new();
    match &resolved.metadata {
        Some(metadata) => {
            for column in metadata {
                paths
                    .entry(column.db_name.clone())
                    .or_insert_with(|| (column.access_path.clone(), column.optional));
            }
        }
        None => {
            for column in structural_columns(&shape.descriptor()) {
                paths
                    .entry(column.name)
                    .or_insert((column.path, column.optional));
            }
        }
    }

    resolved
        .columns
        .iter()
        .map(|column| {
            let accessor = paths.get(column).and_then(|(path, optional)| {
                shape.reader_at(path).map(|read| FieldAccessor {
                    path: path.clone(),
                    optional: *optional,
                    read,
                })
            });
            if accessor.is_none() {
                warn!(
                    "Column {}.{} has no readable member in {}; it will be written as NULL",
                    resolved.table_name,
                    column,
                    shape.type_name()
                );
            }
            accessor
        })
        .collect()
}

/// Reads one row of values, aligned with the column list.
pub(crate) fn extract_row<T>(
    accessors: &[Option<FieldAccessor<T>>],
    record: &T,
    out: &mut Vec<SqlValue>,
) {
    out.extend(accessors.iter().map(|accessor| match accessor {
        Some(accessor) => accessor.read(record),
        None => SqlValue::Null,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::resolve::{resolve_columns, ResolutionSource};
    use crate::sink::{ColumnMetadata, SchemaMetadata};
    use crate::test_helpers::RecordingSink;

    struct Base {
        id: u64,
    }

    impl Record for Base {
        fn shape() -> RecordShape<Self> {
            RecordShape::new("Base").tagged_field("ID", "primaryKey;autoIncrement", |b: &Base| &b.id)
        }
    }

    struct Item {
        base: Base,
        name: String,
        value: Option<i64>,
    }

    impl Record for Item {
        fn shape() -> RecordShape<Self> {
            RecordShape::new("Item")
                .embed("Base", |i: &Item| &i.base)
                .field("Name", |i: &Item| &i.name)
                .field("Value", |i: &Item| &i.value)
        }
    }

    fn item(value: Option<i64>) -> Item {
        Item {
            base: Base { id: 7 },
            name: "widget".to_string(),
            value,
        }
    }

    #[test]
    fn test_metadata_accessors_align_with_columns() {
        let sink = RecordingSink::mysql();
        let shape = Item::shape();
        let resolved = resolve_columns(&shape.descriptor(), sink.as_ref()).unwrap();
        assert_eq!(resolved.columns, vec!["id", "name", "value"]);

        let accessors = build_accessors(&shape, &resolved);
        assert_eq!(accessors.len(), 3);
        let id = accessors[0].as_ref().unwrap();
        assert_eq!(id.path(), &[0, 0]);
        assert!(!id.is_optional());
        assert!(accessors[2].as_ref().unwrap().is_optional());

        let mut row = Vec::new();
        extract_row(&accessors, &item(None), &mut row);
        assert_eq!(
            row,
            vec![
                SqlValue::UInt(7),
                SqlValue::Text("widget".to_string()),
                SqlValue::Null
            ]
        );
    }

    #[test]
    fn test_structural_accessors() {
        let sink = RecordingSink::mysql().rejecting_introspection();
        let shape = Item::shape();
        let resolved = resolve_columns(&shape.descriptor(), sink.as_ref()).unwrap();
        assert_eq!(resolved.source, ResolutionSource::Structural);

        let accessors = build_accessors(&shape, &resolved);
        let mut row = Vec::new();
        extract_row(&accessors, &item(Some(3)), &mut row);
        assert_eq!(row[0], SqlValue::UInt(7));
        assert_eq!(row[2], SqlValue::Int(3));
    }

    #[test]
    fn test_unresolvable_column_keeps_null_slot() {
        // Introspection reporting a column the record cannot supply
        let sink = RecordingSink::mysql().with_introspection(SchemaMetadata {
            table_name: "items".to_string(),
            columns: vec![
                ColumnMetadata {
                    db_name: "name".to_string(),
                    access_path: vec![1],
                    optional: false,
                    auto_increment: false,
                    ignored: false,
                },
                ColumnMetadata {
                    db_name: "legacy_code".to_string(),
                    access_path: vec![9],
                    optional: false,
                    auto_increment: false,
                    ignored: false,
                },
                ColumnMetadata {
                    db_name: "value".to_string(),
                    access_path: vec![2],
                    optional: true,
                    auto_increment: false,
                    ignored: false,
                },
            ],
        });
        let shape = Item::shape();
        let resolved = resolve_columns(&shape.descriptor(), sink.as_ref()).unwrap();
        let accessors = build_accessors(&shape, &resolved);
        assert!(accessors[1].is_none());

        let mut row = Vec::new();
        extract_row(&accessors, &item(Some(1)), &mut row);
        assert_eq!(row.len(), resolved.columns.len());
        assert_eq!(
            row,
            vec![
                SqlValue::Text("widget".to_string()),
                SqlValue::Null,
                SqlValue::Int(1)
            ]
        );
    }
}
