//! Table and column naming conventions.
//!
//! Two conventions exist side by side. `NamingStrategy` is the sink mapper's
//! convention: acronym-aware snake case for columns and a pluralised, optionally
//! prefixed table name. The free functions `to_snake_case` and
//! `fallback_table_name` are the naive convention of the structural fallback
//! walk.

/// Naming rules a sink applies during schema introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingStrategy {
    /// Prepended to every derived table name
    pub table_prefix: String,
    /// Use the singular form for derived table names
    pub singular_table: bool,
}

impl NamingStrategy {
    /// Table name for a type without an explicit table.
    pub fn table_name(&self, type_name: &str) -> String {
        let base = column_case(type_name);
        if self.singular_table {
            format!("{}{}", self.table_prefix, base)
        } else {
            format!("{}{}", self.table_prefix, pluralize(&base))
        }
    }

    /// Column name for a member without a `column:` override.
    pub fn column_name(&self, member: &str) -> String {
        column_case(member)
    }
}

/// Acronym-aware snake case: `StorageConfigID` -> `storage_config_id`,
/// `HTTPServer` -> `http_server`.
fn column_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let starts_word = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if starts_word && prev != '_' {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

fn pluralize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{}ies", stem);
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

/// Naive snake case: an underscore before every uppercase letter except the
/// first character, then lower-cased. `UserID` becomes `user_i_d`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(c);
    }
    out.to_lowercase()
}

/// Lower-cased type name with a trailing `s`.
pub fn fallback_table_name(type_name: &str) -> String {
    format!("{}s", type_name.to_lowercase())
}
