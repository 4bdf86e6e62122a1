//! Fluent, parameterised query building over cached record tables.
//!
//! The builder translates structured condition maps into SQL with every
//! caller-supplied value bound as a parameter; nothing from the outside ever
//! lands in the SQL text itself. Column names are resolved through the
//! table's field mapping, so filters address fields by slug (or
//! `slug.sub_field` for range ends), never by physical column.
//!
//! ## Condition shapes
//!
//! ```text
//! {field: literal}                              equality
//! {field: {gt|gte|lt|lte|eq|ne: value}}         comparison
//! {field: {contains|starts_with|...: str}}      text search
//! {field: {in|not_in: [values]}}                membership
//! {field: {between|not_between: {min, max}}}    ranges
//! {field: {is_empty|is_not_empty: true}}        emptiness
//! {field: {has_any_of|has_all_of|...: [..]}}    multi-select sets
//! {field: {is_before|is_on_or_after: ts}}       date ordering
//! {field: {is_overdue: true}}                   due-date state
//! ```
//!
//! Unknown field slugs are skipped silently so stale saved filters degrade
//! instead of erroring. Range fields compare by their `_to` column unless a
//! sub-field is named explicitly.

use crate::libs::codec::{self, Row, SqlValue};
use crate::libs::fields::FieldType;
use crate::libs::messages::Message;
use crate::libs::schema::{FieldMapEntry, TableMapping};
use crate::msg_debug;
use anyhow::Result;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ToSql};
use serde_json::{Map, Value};

/// Sort direction accepted by [`QueryBuilder::order`].
fn direction_sql(direction: &str) -> &'static str {
    match direction.to_ascii_lowercase().as_str() {
        "desc" => "DESC",
        _ => "ASC",
    }
}

/// A column resolved from a filter path, together with its field context.
struct ResolvedColumn {
    column: String,
    kind: FieldType,
    /// The full mapping entry when the path addressed a synthesised field.
    entry: Option<FieldMapEntry>,
}

/// Builds and runs parameterised queries against one record table.
#[derive(Debug)]
pub struct QueryBuilder<'conn> {
    conn: &'conn Connection,
    table: String,
    mapping: TableMapping,
    conditions: Vec<(String, Vec<SqlValue>)>,
    order_clauses: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl<'conn> QueryBuilder<'conn> {
    pub fn new(conn: &'conn Connection, table: String, mapping: TableMapping) -> Self {
        Self {
            conn,
            table,
            mapping,
            conditions: Vec::new(),
            order_clauses: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// The field type a filter path resolves to, if the field is known.
    pub fn field_type(&self, path: &str) -> Option<FieldType> {
        self.resolve(path).map(|r| r.kind)
    }

    /// Adds every condition of the map; multiple calls AND together.
    pub fn where_(mut self, conditions: &Value) -> Self {
        if let Value::Object(map) = conditions {
            for (path, spec) in map {
                if let Some((clause, params)) = self.condition(path, spec) {
                    self.conditions.push((clause, params));
                }
            }
        }
        self
    }

    /// Adds a pre-built SQL fragment with its bind values.
    ///
    /// Used by the filter translator for parenthesised OR groups; the
    /// fragment must come from [`QueryBuilder::condition`] output, never
    /// from user input.
    pub fn where_raw(mut self, clause: String, params: Vec<SqlValue>) -> Self {
        self.conditions.push((clause, params));
        self
    }

    pub fn order(mut self, path: &str, direction: &str) -> Self {
        if let Some(resolved) = self.resolve(path) {
            self.order_clauses.push(format!("\"{}\" {}", resolved.column, direction_sql(direction)));
        }
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Number of rows matching the current conditions.
    pub fn count(&self) -> Result<i64> {
        let (where_sql, params) = self.where_clause();
        let sql = format!("SELECT COUNT(*) FROM \"{}\"{}", self.table, where_sql);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let count = self.conn.query_row(&sql, &param_refs[..], |row| row.get(0))?;
        Ok(count)
    }

    /// Runs the query and reconstructs matching records.
    pub fn execute(&self) -> Result<Vec<Value>> {
        let (where_sql, mut params) = self.where_clause();
        let mut sql = format!("SELECT * FROM \"{}\"{}", self.table, where_sql);

        if !self.order_clauses.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_clauses.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(SqlValue::Integer(limit));
            if let Some(offset) = self.offset {
                sql.push_str(" OFFSET ?");
                params.push(SqlValue::Integer(offset));
            }
        } else if let Some(offset) = self.offset {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(SqlValue::Integer(offset));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        let rows = stmt.query_map(&param_refs[..], |row| {
            let mut map = Row::new();
            for (index, name) in column_names.iter().enumerate() {
                map.insert(name.clone(), json_from_sql(row.get_ref(index)?));
            }
            Ok(map)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(codec::reconstruct_record(&self.mapping, &row?));
        }
        Ok(records)
    }

    /// Builds the `(clause, params)` pair for one `path: spec` condition.
    ///
    /// Public so the filter translator can assemble nested OR groups from
    /// the same primitives. Returns `None` for unknown fields.
    pub fn condition(&self, path: &str, spec: &Value) -> Option<(String, Vec<SqlValue>)> {
        let Some(resolved) = self.resolve(path) else {
            msg_debug!(Message::UnknownFieldSkipped(path.to_string()));
            return None;
        };

        match spec {
            Value::Object(ops) => self.operator_conditions(&resolved, ops),
            literal => {
                if literal.is_null() {
                    Some((format!("\"{}\" IS NULL", resolved.column), vec![]))
                } else {
                    Some((format!("\"{}\" = ?", resolved.column), vec![bind_value(literal)]))
                }
            }
        }
    }

    /// Translates an operator map; multiple operators AND together.
    fn operator_conditions(&self, resolved: &ResolvedColumn, ops: &Map<String, Value>) -> Option<(String, Vec<SqlValue>)> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for (op, value) in ops {
            let (clause, mut bound) = self.operator_condition(resolved, op, value)?;
            clauses.push(clause);
            params.append(&mut bound);
        }

        if clauses.is_empty() {
            return None;
        }
        Some((clauses.join(" AND "), params))
    }

    fn operator_condition(&self, resolved: &ResolvedColumn, op: &str, value: &Value) -> Option<(String, Vec<SqlValue>)> {
        let col = format!("\"{}\"", resolved.column);

        let simple = |sql: String, params: Vec<SqlValue>| Some((sql, params));

        match op {
            "eq" => simple(format!("{} = ?", col), vec![bind_value(value)]),
            "ne" => simple(format!("{} != ?", col), vec![bind_value(value)]),
            "gt" => simple(format!("{} > ?", col), vec![bind_value(value)]),
            "gte" => simple(format!("{} >= ?", col), vec![bind_value(value)]),
            "lt" => simple(format!("{} < ?", col), vec![bind_value(value)]),
            "lte" => simple(format!("{} <= ?", col), vec![bind_value(value)]),
            "contains" => simple(format!("{} LIKE '%' || ? || '%'", col), vec![bind_value(value)]),
            "not_contains" => simple(format!("({} IS NULL OR {} NOT LIKE '%' || ? || '%')", col, col), vec![bind_value(value)]),
            "starts_with" => simple(format!("{} LIKE ? || '%'", col), vec![bind_value(value)]),
            "ends_with" => simple(format!("{} LIKE '%' || ?", col), vec![bind_value(value)]),
            "in" | "is_any_of" => {
                let values = value.as_array()?;
                if values.is_empty() {
                    // Empty membership can never match
                    return simple("0 = 1".to_string(), vec![]);
                }
                simple(
                    format!("{} IN ({})", col, placeholders(values.len())),
                    values.iter().map(bind_value).collect(),
                )
            }
            "not_in" | "is_none_of" => {
                let values = value.as_array()?;
                if values.is_empty() {
                    return simple("1 = 1".to_string(), vec![]);
                }
                simple(
                    format!("({} IS NULL OR {} NOT IN ({}))", col, col, placeholders(values.len())),
                    values.iter().map(bind_value).collect(),
                )
            }
            "between" | "not_between" => {
                let min = value.get("min")?;
                let max = value.get("max")?;
                let keyword = if op == "between" { "BETWEEN" } else { "NOT BETWEEN" };
                simple(format!("{} {} ? AND ?", col, keyword), vec![bind_value(min), bind_value(max)])
            }
            "is_null" => simple(format!("{} IS NULL", col), vec![]),
            "is_not_null" => simple(format!("{} IS NOT NULL", col), vec![]),
            "is_empty" => {
                if resolved.kind.is_json_array() {
                    simple(format!("({} IS NULL OR {} = '[]')", col, col), vec![])
                } else {
                    simple(format!("({} IS NULL OR {} = '')", col, col), vec![])
                }
            }
            "is_not_empty" => {
                if resolved.kind.is_json_array() {
                    simple(format!("({} IS NOT NULL AND {} != '[]')", col, col), vec![])
                } else {
                    simple(format!("({} IS NOT NULL AND {} != '')", col, col), vec![])
                }
            }
            "has_any_of" => {
                let values = value.as_array()?;
                if values.is_empty() {
                    return simple("0 = 1".to_string(), vec![]);
                }
                simple(
                    format!(
                        "({} IS NOT NULL AND EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value IN ({})))",
                        col,
                        col,
                        placeholders(values.len())
                    ),
                    values.iter().map(bind_value).collect(),
                )
            }
            "has_all_of" => {
                let values = value.as_array()?;
                let mut clauses = vec![format!("{} IS NOT NULL", col)];
                let mut params = Vec::new();
                for v in values {
                    clauses.push(format!("EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value = ?)", col));
                    params.push(bind_value(v));
                }
                simple(format!("({})", clauses.join(" AND ")), params)
            }
            "has_none_of" => {
                let values = value.as_array()?;
                if values.is_empty() {
                    return simple("1 = 1".to_string(), vec![]);
                }
                simple(
                    format!(
                        "({} IS NULL OR {} = '[]' OR NOT EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value IN ({})))",
                        col,
                        col,
                        col,
                        placeholders(values.len())
                    ),
                    values.iter().map(bind_value).collect(),
                )
            }
            "is_exactly" => {
                let values = value.as_array()?;
                if values.is_empty() {
                    return simple(format!("{} = '[]'", col), vec![]);
                }
                let n = values.len();
                simple(
                    format!(
                        "((SELECT COUNT(DISTINCT json_each.value) FROM json_each({}) WHERE json_each.value IN ({})) = {} \
                         AND (SELECT COUNT(DISTINCT json_each.value) FROM json_each({})) = {})",
                        col,
                        placeholders(n),
                        n,
                        col,
                        n
                    ),
                    values.iter().map(bind_value).collect(),
                )
            }
            "is_before" => simple(format!("{} < ?", col), vec![bind_value(value)]),
            "is_on_or_before" => simple(format!("{} <= ?", col), vec![bind_value(value)]),
            "is_on_or_after" => simple(format!("{} >= ?", col), vec![bind_value(value)]),
            "is_overdue" => {
                let overdue = self.overdue_column(resolved)?;
                simple(format!("\"{}\" = 1", overdue), vec![])
            }
            "is_not_overdue" => {
                let overdue = self.overdue_column(resolved)?;
                simple(format!("(\"{}\" = 0 OR \"{}\" IS NULL)", overdue, overdue), vec![])
            }
            "file_name_contains" => simple(
                format!(
                    "({} IS NOT NULL AND EXISTS (SELECT 1 FROM json_each({}) \
                     WHERE json_extract(json_each.value, '$.metadata.filename') LIKE '%' || ? || '%'))",
                    col, col
                ),
                vec![bind_value(value)],
            ),
            "file_type_is" => simple(
                format!(
                    "({} IS NOT NULL AND EXISTS (SELECT 1 FROM json_each({}) \
                     WHERE json_extract(json_each.value, '$.metadata.mimetype') LIKE '%' || ? || '%'))",
                    col, col
                ),
                vec![bind_value(value)],
            ),
            unknown => {
                msg_debug!(format!("Unsupported query operator '{}'", unknown));
                None
            }
        }
    }

    /// The `_is_overdue` sibling column of a due-date field.
    fn overdue_column(&self, resolved: &ResolvedColumn) -> Option<String> {
        let entry = resolved.entry.as_ref()?;
        entry.column_named(&format!("{}_is_overdue", entry.base)).map(|c| c.name.clone())
    }

    /// Resolves `id`, a field slug, or `slug.sub_field` to a column.
    fn resolve(&self, path: &str) -> Option<ResolvedColumn> {
        if path == "id" {
            return Some(ResolvedColumn {
                column: "id".to_string(),
                kind: FieldType::RecordId,
                entry: None,
            });
        }

        if let Some((slug, sub)) = path.split_once('.') {
            let entry = self.mapping.get(slug)?;
            let column = entry.sub_column(sub)?;
            return Some(ResolvedColumn {
                column: column.name.clone(),
                kind: entry.kind(),
                entry: Some(entry.clone()),
            });
        }

        let entry = self.mapping.get(path)?;
        Some(ResolvedColumn {
            column: entry.default_column().name.clone(),
            kind: entry.kind(),
            entry: Some(entry.clone()),
        })
    }

    fn where_clause(&self) -> (String, Vec<SqlValue>) {
        if self.conditions.is_empty() {
            return (String::new(), Vec::new());
        }
        let clause = self
            .conditions
            .iter()
            .map(|(c, _)| c.as_str())
            .collect::<Vec<_>>()
            .join(" AND ");
        let params = self.conditions.iter().flat_map(|(_, p)| p.iter().cloned()).collect();
        (format!(" WHERE {}", clause), params)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Converts a JSON scalar into a bind value.
pub fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Converts a read cell back into JSON.
fn json_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => Value::from(String::from_utf8_lossy(b).to_string()),
    }
}
