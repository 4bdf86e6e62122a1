//! Deterministic column synthesis for dynamic record tables.
//!
//! Every cached remote table gets a physical SQLite table whose columns are
//! derived from the remote field catalog. This module owns that derivation:
//! name sanitisation, the per-type column layouts, collision handling, and
//! the index policy.
//!
//! ## Naming rules
//!
//! Column names are derived from the field *label* (slug as fallback):
//! lower-cased, accent-folded, runs of non-alphanumerics collapsed to `_`,
//! leading/trailing `_` stripped. A name that starts with a digit gets an
//! `f_` prefix, a SQL reserved word gets a `field_` prefix, and a name that
//! sanitises away entirely becomes `column`. Collisions within a table get
//! numeric suffixes (`status`, `status_2`, ...).

use crate::libs::fields::{FieldType, RemoteField};
use crate::libs::fuzzy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Bookkeeping columns present on every record table.
pub const BOOKKEEPING_COLUMNS: [&str; 3] = ["id", "cached_at", "expires_at"];

/// Fallback column name when a label sanitises to nothing.
const FALLBACK_COLUMN: &str = "column";

/// SQL reserved words that may not appear as bare column names.
///
/// The SQLite keyword list; matching is case-insensitive on the sanitised
/// (already lower-case) name.
const RESERVED_WORDS: &[&str] = &[
    "abort", "action", "add", "after", "all", "alter", "analyze", "and", "as", "asc", "attach", "autoincrement", "before", "begin", "between",
    "by", "cascade", "case", "cast", "check", "collate", "column", "commit", "conflict", "constraint", "create", "cross", "current_date",
    "current_time", "current_timestamp", "database", "default", "deferrable", "deferred", "delete", "desc", "detach", "distinct", "drop",
    "each", "else", "end", "escape", "except", "exclusive", "exists", "explain", "fail", "for", "foreign", "from", "full", "glob", "group",
    "having", "if", "ignore", "immediate", "in", "index", "indexed", "initially", "inner", "insert", "instead", "intersect", "into", "is",
    "isnull", "join", "key", "left", "like", "limit", "match", "natural", "no", "not", "notnull", "null", "of", "offset", "on", "or", "order",
    "outer", "plan", "pragma", "primary", "query", "raise", "recursive", "references", "regexp", "reindex", "release", "rename", "replace",
    "restrict", "right", "rollback", "row", "savepoint", "select", "set", "table", "temp", "temporary", "then", "to", "transaction", "trigger",
    "union", "unique", "update", "using", "vacuum", "values", "view", "virtual", "when", "where", "with", "without",
];

/// Storage class of a synthesised column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    Text,
    Real,
    Integer,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Real => "REAL",
            SqlType::Integer => "INTEGER",
        }
    }
}

/// A single physical column derived from a remote field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    /// Whether the index policy wants an index on this column.
    pub indexed: bool,
}

impl ColumnDef {
    fn new(name: String, sql_type: SqlType, indexed: bool) -> Self {
        Self { name, sql_type, indexed }
    }
}

/// The columns a single remote field maps to, in order.
///
/// Scalar fields produce one column; compound fields (status, date ranges,
/// checklists, ...) produce several. The first column is the "searchable"
/// one unless a sub-field is addressed explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapEntry {
    pub slug: String,
    pub field_type: String,
    pub base: String,
    pub columns: Vec<ColumnDef>,
}

impl FieldMapEntry {
    pub fn kind(&self) -> FieldType {
        FieldType::from_code(&self.field_type)
    }

    /// Column used for unqualified filters and sorts on this field.
    ///
    /// Range fields compare by range end, matching the remote API's own
    /// filter and sort behaviour.
    pub fn default_column(&self) -> &ColumnDef {
        if self.kind().is_range() {
            self.column_with_suffix("_to").unwrap_or(&self.columns[0])
        } else {
            &self.columns[0]
        }
    }

    /// Resolves a named sub-field (`from_date`, `to_date`) to its column.
    pub fn sub_column(&self, sub_field: &str) -> Option<&ColumnDef> {
        match sub_field {
            "from_date" | "from" => self.column_with_suffix("_from"),
            "to_date" | "to" => self.column_with_suffix("_to"),
            _ => self.columns.iter().find(|c| c.name == format!("{}_{}", self.base, sub_field)),
        }
    }

    fn column_with_suffix(&self, suffix: &str) -> Option<&ColumnDef> {
        let wanted = format!("{}{}", self.base, suffix);
        self.columns.iter().find(|c| c.name == wanted)
    }

    /// Looks up a sibling column by full name, e.g. the `_json` dump.
    pub fn column_named(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Ordered field-to-columns mapping for one local table.
///
/// Persisted as JSON in the cache table registry; the stored order is the
/// catalog order at synthesis time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMapping {
    pub entries: Vec<FieldMapEntry>,
}

impl TableMapping {
    pub fn get(&self, slug: &str) -> Option<&FieldMapEntry> {
        self.entries.iter().find(|e| e.slug == slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.get(slug).is_some()
    }

    /// All physical columns in stored order, bookkeeping excluded.
    pub fn all_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.entries.iter().flat_map(|e| e.columns.iter())
    }

    /// Column names already taken, for collision checks during evolution.
    pub fn used_names(&self) -> HashSet<String> {
        let mut used: HashSet<String> = BOOKKEEPING_COLUMNS.iter().map(|s| s.to_string()).collect();
        for column in self.all_columns() {
            used.insert(column.name.clone());
        }
        used
    }
}

/// Sanitises an arbitrary label into a SQL-safe column name.
///
/// The result always matches `[a-z_][a-z0-9_]*` and is never a reserved
/// word.
pub fn sanitise_column_name(input: &str) -> String {
    let mut name = sanitise_identifier(input);

    if name.is_empty() {
        name = FALLBACK_COLUMN.to_string();
    }
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        name = format!("f_{}", name);
    }
    if RESERVED_WORDS.contains(&name.as_str()) {
        name = format!("field_{}", name);
    }
    name
}

/// Lower-case, accent-fold, collapse non-alphanumeric runs to `_`.
fn sanitise_identifier(input: &str) -> String {
    let folded = fuzzy::fold_ascii(input);
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Physical table name for a cached remote table.
pub fn local_table_name(table_name: &str, table_id: &str) -> String {
    let name = sanitise_identifier(table_name);
    let id = sanitise_identifier(table_id);
    let name = if name.is_empty() { "table".to_string() } else { name };
    format!("cache_records_{}_{}", name, id)
}

/// Synthesises the full mapping for a field catalog.
///
/// Bookkeeping names are reserved up front so a field labelled "id" or
/// "expires at" cannot shadow them.
pub fn synthesise(catalog: &[RemoteField]) -> TableMapping {
    let mut used: HashSet<String> = BOOKKEEPING_COLUMNS.iter().map(|s| s.to_string()).collect();
    let entries = catalog.iter().map(|field| synthesise_field(field, &mut used)).collect();
    TableMapping { entries }
}

/// Synthesises columns for fields added by schema evolution.
pub fn synthesise_added(mapping: &TableMapping, added: &[RemoteField]) -> Vec<FieldMapEntry> {
    let mut used = mapping.used_names();
    added.iter().map(|field| synthesise_field(field, &mut used)).collect()
}

/// Columns for one field, deduplicated against the names already in use.
pub fn synthesise_field(field: &RemoteField, used: &mut HashSet<String>) -> FieldMapEntry {
    let label = if field.label.trim().is_empty() { &field.slug } else { &field.label };
    let base = sanitise_column_name(label);
    let force_index = field.is_primary() || field.slug == "title";

    // Bump the base with a numeric suffix until every produced column is free
    let mut suffix = 1usize;
    loop {
        let candidate_base = if suffix == 1 { base.clone() } else { format!("{}_{}", base, suffix) };
        let columns = columns_for(field.kind(), &candidate_base, force_index);
        if columns.iter().all(|c| !used.contains(&c.name)) {
            for column in &columns {
                used.insert(column.name.clone());
            }
            return FieldMapEntry {
                slug: field.slug.clone(),
                field_type: field.field_type.clone(),
                base: candidate_base,
                columns,
            };
        }
        suffix += 1;
    }
}

/// The per-type column layout table.
fn columns_for(kind: FieldType, base: &str, force_index: bool) -> Vec<ColumnDef> {
    let indexed = kind.always_indexed() || force_index;
    let col = |name: String, sql_type: SqlType, idx: bool| ColumnDef::new(name, sql_type, idx);

    match kind {
        FieldType::FirstCreated => vec![
            col("created_on".into(), SqlType::Text, indexed),
            col("created_by".into(), SqlType::Text, false),
        ],
        FieldType::LastUpdated => vec![
            col("updated_on".into(), SqlType::Text, indexed),
            col("updated_by".into(), SqlType::Text, false),
        ],
        FieldType::DeletedDate => vec![
            col("deleted_on".into(), SqlType::Text, indexed),
            col("deleted_by".into(), SqlType::Text, false),
        ],
        FieldType::DateRange => vec![
            col(format!("{}_from", base), SqlType::Text, indexed),
            col(format!("{}_to", base), SqlType::Text, indexed),
            col(format!("{}_from_include_time", base), SqlType::Integer, false),
            col(format!("{}_to_include_time", base), SqlType::Integer, false),
        ],
        FieldType::DueDate => vec![
            col(format!("{}_from", base), SqlType::Text, indexed),
            col(format!("{}_to", base), SqlType::Text, indexed),
            col(format!("{}_is_overdue", base), SqlType::Integer, false),
            col(format!("{}_is_completed", base), SqlType::Integer, false),
            col(format!("{}_from_include_time", base), SqlType::Integer, false),
            col(format!("{}_to_include_time", base), SqlType::Integer, false),
        ],
        FieldType::Status => vec![
            col(base.to_string(), SqlType::Text, indexed),
            col(format!("{}_updated_on", base), SqlType::Text, false),
        ],
        FieldType::Address => vec![
            col(format!("{}_text", base), SqlType::Text, indexed),
            col(format!("{}_json", base), SqlType::Text, false),
        ],
        FieldType::FullName => vec![
            col(base.to_string(), SqlType::Text, indexed),
            col(format!("{}_json", base), SqlType::Text, false),
        ],
        FieldType::SmartDoc => vec![
            col(format!("{}_preview", base), SqlType::Text, indexed),
            col(format!("{}_json", base), SqlType::Text, false),
        ],
        FieldType::Checklist => vec![
            col(format!("{}_json", base), SqlType::Text, false),
            col(format!("{}_total", base), SqlType::Integer, indexed),
            col(format!("{}_completed", base), SqlType::Integer, false),
        ],
        FieldType::Vote => vec![
            col(format!("{}_count", base), SqlType::Integer, indexed),
            col(format!("{}_json", base), SqlType::Text, false),
        ],
        FieldType::TimeTracking => vec![
            col(format!("{}_json", base), SqlType::Text, false),
            col(format!("{}_total", base), SqlType::Real, indexed),
        ],
        FieldType::AutoNumber | FieldType::CommentsCount | FieldType::YesNo => {
            vec![col(base.to_string(), SqlType::Integer, indexed)]
        }
        kind if kind.is_numeric() => vec![col(base.to_string(), SqlType::Real, indexed)],
        // Text scalars, dates, JSON arrays, formula family and unknown types
        // all live in a single text column
        _ => vec![col(base.to_string(), SqlType::Text, indexed)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(slug: &str, label: &str, field_type: &str) -> RemoteField {
        RemoteField::new(slug, label, field_type)
    }

    #[test]
    fn sanitises_to_sql_safe_names() {
        assert_eq!(sanitise_column_name("Fecha de Creación"), "fecha_de_creacion");
        assert_eq!(sanitise_column_name("  Weird -- name!! "), "weird_name");
        assert_eq!(sanitise_column_name("2nd Phase"), "f_2nd_phase");
        assert_eq!(sanitise_column_name("Order"), "field_order");
        assert_eq!(sanitise_column_name("???"), "column");
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let catalog = vec![
            field("s1", "Status", "statusfield"),
            field("s2", "Status", "statusfield"),
        ];
        let mapping = synthesise(&catalog);
        assert_eq!(mapping.entries[0].columns[0].name, "status");
        assert_eq!(mapping.entries[1].columns[0].name, "status_2");
        assert_eq!(mapping.entries[1].columns[1].name, "status_2_updated_on");
    }

    #[test]
    fn bookkeeping_names_are_reserved() {
        let mapping = synthesise(&[field("f", "Id", "textfield")]);
        assert_eq!(mapping.entries[0].columns[0].name, "id_2");
    }

    #[test]
    fn due_date_produces_range_and_flags() {
        let mapping = synthesise(&[field("due", "Due Date", "duedatefield")]);
        let names: Vec<&str> = mapping.entries[0].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "due_date_from",
                "due_date_to",
                "due_date_is_overdue",
                "due_date_is_completed",
                "due_date_from_include_time",
                "due_date_to_include_time"
            ]
        );
        assert!(mapping.entries[0].columns[0].indexed);
        assert!(mapping.entries[0].columns[1].indexed);
    }

    #[test]
    fn default_column_targets_range_end() {
        let mapping = synthesise(&[field("due", "Due Date", "duedatefield")]);
        assert_eq!(mapping.entries[0].default_column().name, "due_date_to");
        assert_eq!(mapping.entries[0].sub_column("from_date").unwrap().name, "due_date_from");
    }

    #[test]
    fn primary_fields_are_indexed() {
        let mut title = field("title", "Name", "textfield");
        title.params = Some(json!({"primary": true}));
        let mapping = synthesise(&[title]);
        assert!(mapping.entries[0].columns[0].indexed);
    }

    #[test]
    fn table_names_are_sanitised() {
        assert_eq!(local_table_name("Proyectos Activos", "64e1a9"), "cache_records_proyectos_activos_64e1a9");
        assert_eq!(local_table_name("!!!", "abc"), "cache_records_table_abc");
    }
}
