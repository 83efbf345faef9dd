//! Member tag parsing.
//!
//! Tags use the `key[:value]` directives separated by `;` that ORM struct
//! tags use, e.g. `column:asset_id;type:varchar(100);uniqueIndex`. Keys are
//! matched case-insensitively. Directives that do not change which columns
//! are written or what they are called (`type`, `index`, `primaryKey`, ...)
//! are accepted and ignored. Nesting comes from `RecordShape::embed`, so the
//! `embedded` directive carries no meaning here either.

/// Persistence-relevant directives of one member tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTag {
    /// Explicit column name (`column:<name>`); `Some("")` when the value is empty
    pub column: Option<String>,
    /// The whole tag is `-`: the member is not persisted at all
    pub skip: bool,
    /// `-:all`: no read, write or migration
    pub ignore_all: bool,
    /// `-:migration`: mapped but not part of the table's columns
    pub ignore_migration: bool,
    /// `autoIncrement`: the database fills the column
    pub auto_increment: bool,
    /// `embeddedPrefix:<prefix>`: prefix for the flattened columns
    pub embedded_prefix: Option<String>,
}

impl FieldTag {
    /// Parses a raw tag. An absent or empty tag yields the default.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut tag = FieldTag::default();
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return tag,
        };
        if raw == "-" {
            tag.skip = true;
            return tag;
        }

        for part in raw.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = match part.split_once(':') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (part, None),
            };
            match (key.to_ascii_uppercase().as_str(), value) {
                ("COLUMN", value) => tag.column = Some(value.unwrap_or("").to_string()),
                ("-", Some(value)) if value.eq_ignore_ascii_case("all") => tag.ignore_all = true,
                ("-", Some(value)) if value.eq_ignore_ascii_case("migration") => {
                    tag.ignore_migration = true
                }
                ("-", _) => tag.skip = true,
                ("AUTOINCREMENT", _) => tag.auto_increment = true,
                ("EMBEDDEDPREFIX", Some(value)) => tag.embedded_prefix = Some(value.to_string()),
                _ => {}
            }
        }
        tag
    }

    /// Returns true if the member produces no column under any mapping.
    pub fn is_excluded(&self) -> bool {
        self.skip || self.ignore_all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tag() {
        assert_eq!(FieldTag::parse(None), FieldTag::default());
        assert_eq!(FieldTag::parse(Some("  ")), FieldTag::default());
    }

    #[test]
    fn test_column_override_among_other_directives() {
        let tag = FieldTag::parse(Some("type:varchar(100);column:asset_id ; uniqueIndex"));
        assert_eq!(tag.column.as_deref(), Some("asset_id"));
        assert!(!tag.skip);
    }

    #[test]
    fn test_skip_and_ignore_variants() {
        assert!(FieldTag::parse(Some("-")).skip);
        assert!(FieldTag::parse(Some("-")).is_excluded());
        let all = FieldTag::parse(Some("-:all"));
        assert!(all.ignore_all && !all.skip);
        let migration = FieldTag::parse(Some("-:migration"));
        assert!(migration.ignore_migration);
        assert!(!migration.is_excluded());
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let tag = FieldTag::parse(Some("AUTOINCREMENT;Column:id"));
        assert!(tag.auto_increment);
        assert_eq!(tag.column.as_deref(), Some("id"));
    }

    #[test]
    fn test_empty_column_value_is_kept_as_empty() {
        let tag = FieldTag::parse(Some("column:"));
        assert_eq!(tag.column.as_deref(), Some(""));
    }

    #[test]
    fn test_embedded_prefix() {
        let tag = FieldTag::parse(Some("embedded;embeddedPrefix:author_"));
        assert_eq!(tag.embedded_prefix.as_deref(), Some("author_"));
    }

    #[test]
    fn test_directives_without_column_effect_are_ignored() {
        let tag = FieldTag::parse(Some("primaryKey;embedded;uniqueIndex;default:0"));
        assert_eq!(tag, FieldTag::default());
    }
}
