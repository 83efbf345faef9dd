//! Column resolution.
//!
//! Produces the table name, the ordered column list and the auto-increment
//! column of a record shape. The sink's schema introspection is tried first;
//! when it rejects the shape, the members are walked structurally with the
//! naive naming convention instead.
//!
//! Both paths drop the soft-delete column and collapse duplicate column names,
//! keeping the first occurrence.

use std::collections::HashSet;

use log::{debug, warn};
use strum_macros::Display;

use crate::config::SOFT_DELETE_COLUMN;
use crate::error_handling::SchemaError;
use crate::sink::{ColumnMetadata, RelationalSink};

use super::naming::{fallback_table_name, to_snake_case};
use super::{MemberDescriptor, ShapeDescriptor, Visibility};

/// Which path produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ResolutionSource {
    /// The sink's schema introspection
    #[strum(serialize = "metadata")]
    Metadata,
    /// The structural fallback walk
    #[strum(serialize = "structural")]
    Structural,
}

/// Table and columns of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    /// Target table
    pub table_name: String,
    /// Column order used for every VALUES tuple
    pub columns: Vec<String>,
    /// Column filled by the database, if any
    pub auto_increment: Option<String>,
    /// Which path produced the columns
    pub source: ResolutionSource,
    /// Introspection output kept for accessor construction
    pub(crate) metadata: Option<Vec<ColumnMetadata>>,
}

/// A column found by the structural walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StructuralColumn {
    pub name: String,
    pub path: Vec<usize>,
    pub optional: bool,
}

/// Resolves a shape into its table and ordered columns.
///
/// # Errors
///
/// Returns the structural walk's `SchemaError` when introspection failed and
/// the walk found no columns either.
pub fn resolve_columns(
    shape: &ShapeDescriptor,
    sink: &dyn RelationalSink,
) -> Result<ResolvedColumns, SchemaError> {
    match sink.introspect(shape) {
        Ok(meta) => {
            let mut seen = HashSet::new();
            let mut columns = Vec::with_capacity(meta.columns.len());
            let mut auto_increment = None;
            for column in &meta.columns {
                if column.ignored || column.db_name == SOFT_DELETE_COLUMN {
                    continue;
                }
                if !seen.insert(column.db_name.as_str()) {
                    continue;
                }
                if column.auto_increment && auto_increment.is_none() {
                    auto_increment = Some(column.db_name.clone());
                }
                columns.push(column.db_name.clone());
            }

            if !columns.is_empty() {
                return Ok(ResolvedColumns {
                    table_name: meta.table_name,
                    columns,
                    auto_increment,
                    source: ResolutionSource::Metadata,
                    metadata: Some(meta.columns),
                });
            }
            warn!(
                "Schema introspection found no columns for {}, falling back to structural walk",
                shape.type_name
            );
        }
        Err(e) => {
            debug!(
                "Schema introspection rejected {} ({}), falling back to structural walk",
                shape.type_name, e
            );
        }
    }

    let columns: Vec<String> = structural_columns(shape)
        .into_iter()
        .map(|column| column.name)
        .collect();
    if columns.is_empty() {
        return Err(SchemaError::NoColumns(shape.type_name.clone()));
    }

    Ok(ResolvedColumns {
        table_name: fallback_table_name(&shape.type_name),
        columns,
        auto_increment: None,
        source: ResolutionSource::Structural,
        metadata: None,
    })
}

/// Walks the shape members and derives one column per public field.
///
/// Embedded members are flattened into the same namespace. A raw `-` tag or
/// an empty `column:` override skips the member. The soft-delete column and
/// repeated names (first wins) are dropped.
pub(crate) fn structural_columns(shape: &ShapeDescriptor) -> Vec<StructuralColumn> {
    let mut found = Vec::new();
    walk(&shape.members, &[], &mut found);

    let mut seen = HashSet::new();
    found.retain(|column: &StructuralColumn| {
        column.name != SOFT_DELETE_COLUMN && seen.insert(column.name.clone())
    });
    found
}

fn walk(members: &[MemberDescriptor], parent_path: &[usize], out: &mut Vec<StructuralColumn>) {
    for (index, member) in members.iter().enumerate() {
        if member.visibility == Visibility::Private {
            continue;
        }
        let mut path = parent_path.to_vec();
        path.push(index);

        if let Some(children) = &member.embedded {
            walk(children, &path, out);
            continue;
        }

        let name = match member.tag.column.as_deref() {
            Some(column) => column.to_string(),
            None if member.raw_tag.as_deref().map(str::trim) == Some("-") => continue,
            None => to_snake_case(&member.name),
        };
        if name.is_empty() {
            continue;
        }
        out.push(StructuralColumn {
            name,
            path,
            optional: member.nullable,
        });
    }
}
