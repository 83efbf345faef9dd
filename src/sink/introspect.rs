//! Schema introspection performed by a sink's own mapper.
//!
//! This is the metadata path of column resolution: it reads the member tags
//! with the sink's `NamingStrategy` and reports every mapped column with its
//! structural access path. Shapes the mapper does not recognise are rejected
//! so that the caller can fall back to the structural walk.

use std::collections::HashSet;

use crate::error_handling::SchemaError;
use crate::schema::{MemberDescriptor, NamingStrategy, ShapeDescriptor, Visibility};

/// Mapping metadata for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Column name in the database
    pub db_name: String,
    /// Member indices from the root shape down to the field
    pub access_path: Vec<usize>,
    /// The field sits behind an optional indirection
    pub optional: bool,
    /// Tagged `autoIncrement`
    pub auto_increment: bool,
    /// Mapped but not a table column (`-:migration`)
    pub ignored: bool,
}

/// Result of introspecting one record shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMetadata {
    /// Table name under the sink's naming rules
    pub table_name: String,
    /// Columns in declaration order, embedded members flattened in place
    pub columns: Vec<ColumnMetadata>,
}

/// Parses a shape with the given naming rules.
///
/// # Errors
///
/// Returns a `SchemaError` for an unnamed type, duplicate member names within
/// one level, an empty `column:` override, or a `column:` override on an
/// embedded member.
pub fn parse_metadata(
    shape: &ShapeDescriptor,
    naming: &NamingStrategy,
) -> Result<SchemaMetadata, SchemaError> {
    if shape.type_name.trim().is_empty() {
        return Err(SchemaError::UnnamedType);
    }

    let table_name = shape
        .table_name
        .clone()
        .unwrap_or_else(|| naming.table_name(&shape.type_name));

    let mut columns = Vec::new();
    walk(
        &shape.type_name,
        &shape.members,
        &[],
        "",
        naming,
        &mut columns,
    )?;

    Ok(SchemaMetadata {
        table_name,
        columns,
    })
}

fn walk(
    type_name: &str,
    members: &[MemberDescriptor],
    parent_path: &[usize],
    prefix: &str,
    naming: &NamingStrategy,
    out: &mut Vec<ColumnMetadata>,
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for (index, member) in members.iter().enumerate() {
        if !seen.insert(member.name.as_str()) {
            return Err(SchemaError::DuplicateMember {
                type_name: type_name.to_string(),
                member: member.name.clone(),
            });
        }
        if member.visibility == Visibility::Private || member.tag.is_excluded() {
            continue;
        }

        let mut path = parent_path.to_vec();
        path.push(index);

        if let Some(children) = &member.embedded {
            if member.tag.column.is_some() {
                return Err(SchemaError::EmbeddedColumnOverride {
                    type_name: type_name.to_string(),
                    member: member.name.clone(),
                });
            }
            let nested_prefix = format!(
                "{}{}",
                prefix,
                member.tag.embedded_prefix.as_deref().unwrap_or("")
            );
            walk(type_name, children, &path, &nested_prefix, naming, out)?;
            continue;
        }

        let column = match member.tag.column.as_deref() {
            Some("") => {
                return Err(SchemaError::EmptyColumnOverride {
                    type_name: type_name.to_string(),
                    member: member.name.clone(),
                })
            }
            Some(column) => column.to_string(),
            None => naming.column_name(&member.name),
        };

        out.push(ColumnMetadata {
            db_name: format!("{}{}", prefix, column),
            access_path: path,
            optional: member.nullable,
            auto_increment: member.tag.auto_increment,
            ignored: member.tag.ignore_migration,
        });
    }
    Ok(())
}
