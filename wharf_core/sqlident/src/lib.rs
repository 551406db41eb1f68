//! The only sanctioned path from "string out of configuration" to "string
//! embeddable in SQL".
//!
//! Every table, schema, and column name that reaches a generated statement
//! is carried by [`SafeIdentifier`] or [`SafeTable`], whose constructors
//! validate before quoting. Nothing else in the workspace interpolates a
//! bare string into identifier position.

pub mod error;

pub use error::IdentifierError;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// PostgreSQL truncates identifiers beyond 63 bytes.
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// True iff `name` matches `^[A-Za-z_][A-Za-z0-9_]*$` and is at most 63
/// bytes. Anything else is rejected outright, quoting never repairs it.
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_BYTES {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().expect("non-empty");
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The set of schemas the pipeline may touch. This is a security boundary
/// distinct from syntactic validity: `config` and `customer` are valid
/// identifiers but must never be reachable from here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaWhitelist {
    allowed: BTreeSet<String>,
}

impl Default for SchemaWhitelist {
    fn default() -> Self {
        Self::from_names(["workspace", "reference"]).expect("default schemas are valid")
    }
}

impl SchemaWhitelist {
    /// Build a whitelist from deployment configuration. Each entry must
    /// itself be a valid identifier.
    pub fn from_names<I, S>(names: I) -> Result<Self, IdentifierError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            if !is_valid_identifier(name) {
                return Err(IdentifierError::invalid(name));
            }
            allowed.insert(name.to_string());
        }
        Ok(Self { allowed })
    }

    pub fn is_allowed(&self, schema: &str) -> bool {
        self.allowed.contains(schema)
    }
}

/// A single validated, double-quoted identifier.
///
/// Validation happens before quoting; quoting only defeats case folding and
/// reserved words, it never unescapes rejected content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafeIdentifier {
    raw: String,
    quoted: String,
}

impl SafeIdentifier {
    pub fn new(name: &str) -> Result<Self, IdentifierError> {
        if !is_valid_identifier(name) {
            return Err(IdentifierError::invalid(name));
        }
        Ok(Self {
            raw: name.to_string(),
            quoted: format!("\"{name}\""),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The form that may appear in a SQL string.
    pub fn quoted(&self) -> &str {
        &self.quoted
    }
}

impl Display for SafeIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.quoted)
    }
}

/// Validate and quote every column name. Fails atomically: a single bad
/// name yields an error and no partial list.
pub fn quote_columns<S: AsRef<str>>(names: &[S]) -> Result<Vec<SafeIdentifier>, IdentifierError> {
    names
        .iter()
        .map(|n| SafeIdentifier::new(n.as_ref()))
        .collect()
}

/// A schema-qualified table reference that passed both identifier
/// validation and the schema whitelist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafeTable {
    schema: SafeIdentifier,
    table: SafeIdentifier,
}

impl SafeTable {
    /// Split `qualified_or_bare` on `.`, defaulting the schema when the
    /// name is unqualified, then validate both parts and the whitelist.
    pub fn parse(
        qualified_or_bare: &str,
        default_schema: &str,
        whitelist: &SchemaWhitelist,
    ) -> Result<Self, IdentifierError> {
        let (schema, table) = match qualified_or_bare.split_once('.') {
            Some((schema, table)) => {
                if table.contains('.') {
                    return Err(IdentifierError::malformed_table_name(qualified_or_bare));
                }
                (schema, table)
            }
            None => (default_schema, qualified_or_bare),
        };
        Self::new(schema, table, whitelist)
    }

    pub fn new(
        schema: &str,
        table: &str,
        whitelist: &SchemaWhitelist,
    ) -> Result<Self, IdentifierError> {
        let schema_ident = SafeIdentifier::new(schema)?;
        let table_ident = SafeIdentifier::new(table)?;
        if !whitelist.is_allowed(schema) {
            return Err(IdentifierError::schema_not_allowed(schema));
        }
        Ok(Self {
            schema: schema_ident,
            table: table_ident,
        })
    }

    pub fn schema(&self) -> &SafeIdentifier {
        &self.schema
    }

    pub fn table(&self) -> &SafeIdentifier {
        &self.table
    }

    /// `"schema"."table"`, each part independently quoted.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }

    /// Unquoted `schema.table`, used as a stable lock key, never as SQL.
    pub fn raw_key(&self) -> String {
        format!("{}.{}", self.schema.raw(), self.table.raw())
    }
}

impl Display for SafeTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for name in ["a", "zip3", "carrier_rates", "_private", "A9_b"] {
            assert!(is_valid_identifier(name), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_hostile_and_malformed_identifiers() {
        for name in [
            "",
            "3pl",
            "drop table",
            "users;",
            "na'me",
            "x--y",
            "sp ace",
            "semi;colon",
            "Robert'); DROP TABLE Students;--",
            "tab\tname",
        ] {
            assert!(!is_valid_identifier(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn enforces_postgres_length_limit() {
        let at_limit = "a".repeat(63);
        let over_limit = "a".repeat(64);
        assert!(is_valid_identifier(&at_limit));
        assert!(!is_valid_identifier(&over_limit));
    }

    #[test]
    fn safe_table_quotes_both_parts() {
        let whitelist = SchemaWhitelist::default();
        let table = SafeTable::parse("reference.carriers", "workspace", &whitelist).unwrap();
        assert_eq!(table.qualified(), "\"reference\".\"carriers\"");
        assert_eq!(table.raw_key(), "reference.carriers");
    }

    #[test]
    fn bare_name_takes_default_schema() {
        let whitelist = SchemaWhitelist::default();
        let table = SafeTable::parse("carriers", "workspace", &whitelist).unwrap();
        assert_eq!(table.qualified(), "\"workspace\".\"carriers\"");
    }

    #[test]
    fn non_whitelisted_schema_is_rejected() {
        let whitelist = SchemaWhitelist::default();
        let err = SafeTable::parse("config.users", "workspace", &whitelist)
            .expect_err("config schema must not be reachable");
        assert!(matches!(err, IdentifierError::SchemaNotAllowed { .. }));
    }

    #[test]
    fn invalid_identifier_beats_whitelist_check() {
        let whitelist = SchemaWhitelist::default();
        let err = SafeTable::parse("work space.orders", "workspace", &whitelist)
            .expect_err("space in schema");
        assert!(matches!(err, IdentifierError::Invalid { .. }));
    }

    #[test]
    fn double_dot_is_malformed() {
        let whitelist = SchemaWhitelist::default();
        let err = SafeTable::parse("a.b.c", "workspace", &whitelist).expect_err("two dots");
        assert!(matches!(err, IdentifierError::MalformedTableName { .. }));
    }

    #[test]
    fn quote_columns_is_atomic() {
        let err = quote_columns(&["zip3", "Robert'); DROP TABLE Students;--", "pop"])
            .expect_err("hostile column name");
        assert!(matches!(err, IdentifierError::Invalid { .. }));

        let cols = quote_columns(&["zip3", "pop"]).unwrap();
        assert_eq!(cols[0].quoted(), "\"zip3\"");
        assert_eq!(cols[1].quoted(), "\"pop\"");
    }

    #[test]
    fn whitelist_entries_must_be_valid_identifiers() {
        let err = SchemaWhitelist::from_names(["workspace", "bad schema"])
            .expect_err("invalid whitelist entry");
        assert!(matches!(err, IdentifierError::Invalid { .. }));
    }

    #[test]
    fn configured_whitelist_replaces_defaults() {
        let whitelist = SchemaWhitelist::from_names(["staging"]).unwrap();
        assert!(whitelist.is_allowed("staging"));
        assert!(!whitelist.is_allowed("workspace"));
    }
}
