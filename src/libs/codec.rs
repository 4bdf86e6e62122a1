//! Bidirectional mapping between remote record JSON and local row values.
//!
//! Extraction turns one record's heterogeneous field values into the flat
//! `column -> value` map the record tables store; reconstruction reverses
//! it, reassembling compound fields and decoding `_json` dumps so a cached
//! read looks like a remote read.
//!
//! ## Degraded data
//!
//! The codec never fails a whole record over one bad value: an unparseable
//! timestamp extracts as NULL, and a `_json` column that no longer parses
//! reconstructs as the raw string. Null, empty-string and zero values stay
//! distinct through a round trip, and every field present in the source
//! record reappears in the reconstructed one.

use crate::libs::fields::FieldType;
use crate::libs::schema::{FieldMapEntry, TableMapping};
use crate::libs::timestamp;
use rusqlite::types::{ToSqlOutput, Value as RusqliteValue};
use rusqlite::ToSql;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// A value bound into a SQL statement or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Real(f64),
    Integer(i64),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(RusqliteValue::Null),
            SqlValue::Text(s) => ToSqlOutput::Owned(RusqliteValue::Text(s.clone())),
            SqlValue::Real(f) => ToSqlOutput::Owned(RusqliteValue::Real(*f)),
            SqlValue::Integer(i) => ToSqlOutput::Owned(RusqliteValue::Integer(*i)),
        })
    }
}

/// A row read back from a record table, keyed by column name.
pub type Row = HashMap<String, Value>;

/// Extracts every mapped field of a record into column values.
///
/// The record `id` is extracted separately by the storage layer; fields
/// whose value is absent or JSON null contribute no columns.
pub fn extract_record(mapping: &TableMapping, record: &Value) -> Vec<(String, SqlValue)> {
    let mut values = Vec::new();
    for entry in &mapping.entries {
        let value = match record.get(&entry.slug) {
            Some(v) if !v.is_null() => v,
            _ => continue,
        };
        values.extend(extract_field(entry, value));
    }
    values
}

/// Extracts one field value into its column values, in layout order.
pub fn extract_field(entry: &FieldMapEntry, value: &Value) -> Vec<(String, SqlValue)> {
    let cols = &entry.columns;
    let named = |index: usize, v: SqlValue| (cols[index].name.clone(), v);

    match entry.kind() {
        FieldType::FirstCreated | FieldType::LastUpdated | FieldType::DeletedDate => {
            // {on, by} pairs; a bare string is just the timestamp
            let (on, by) = match value {
                Value::Object(map) => (
                    map.get("on").map(date_of).unwrap_or(SqlValue::Null),
                    map.get("by").map(text_of).unwrap_or(SqlValue::Null),
                ),
                other => (date_of(other), SqlValue::Null),
            };
            vec![named(0, on), named(1, by)]
        }
        FieldType::DateRange => {
            let from = value.get("from_date");
            let to = value.get("to_date");
            vec![
                named(0, from.map(date_of).unwrap_or(SqlValue::Null)),
                named(1, to.map(date_of).unwrap_or(SqlValue::Null)),
                named(2, from.map(include_time_of).unwrap_or(SqlValue::Null)),
                named(3, to.map(include_time_of).unwrap_or(SqlValue::Null)),
            ]
        }
        FieldType::DueDate => {
            let from = value.get("from_date");
            let to = value.get("to_date");
            let completed = value.get("status_is_completed").or_else(|| value.get("is_completed"));
            vec![
                named(0, from.map(date_of).unwrap_or(SqlValue::Null)),
                named(1, to.map(date_of).unwrap_or(SqlValue::Null)),
                named(2, value.get("is_overdue").map(bool_int_of).unwrap_or(SqlValue::Null)),
                named(3, completed.map(bool_int_of).unwrap_or(SqlValue::Null)),
                named(4, from.map(include_time_of).unwrap_or(SqlValue::Null)),
                named(5, to.map(include_time_of).unwrap_or(SqlValue::Null)),
            ]
        }
        FieldType::Status => match value {
            Value::Object(map) => vec![
                named(0, map.get("value").map(text_of).unwrap_or(SqlValue::Null)),
                named(1, map.get("updated_on").map(date_of).unwrap_or(SqlValue::Null)),
            ],
            other => vec![named(0, text_of(other)), named(1, SqlValue::Null)],
        },
        FieldType::Address => vec![
            named(0, value.get("sys_root").map(text_of).unwrap_or(SqlValue::Null)),
            named(1, json_dump(value)),
        ],
        FieldType::FullName => vec![
            named(0, value.get("sys_root").map(text_of).unwrap_or(SqlValue::Null)),
            named(1, json_dump(value)),
        ],
        FieldType::SmartDoc => {
            let preview = value.get("preview").or_else(|| value.get("sys_root"));
            vec![named(0, preview.map(text_of).unwrap_or(SqlValue::Null)), named(1, json_dump(value))]
        }
        FieldType::Checklist => vec![
            named(0, json_dump(value)),
            named(1, value.get("total_items").map(int_of).unwrap_or(SqlValue::Null)),
            named(2, value.get("completed_items").map(int_of).unwrap_or(SqlValue::Null)),
        ],
        FieldType::Vote => vec![
            named(0, value.get("total_votes").map(int_of).unwrap_or(SqlValue::Null)),
            named(1, json_dump(value)),
        ],
        FieldType::TimeTracking => vec![
            named(0, json_dump(value)),
            named(1, value.get("total_duration").map(real_of).unwrap_or(SqlValue::Null)),
        ],
        FieldType::YesNo => vec![named(0, bool_int_of(value))],
        FieldType::AutoNumber | FieldType::CommentsCount => vec![named(0, int_of(value))],
        FieldType::Date => vec![named(0, date_of(value))],
        kind if kind.is_numeric() => vec![named(0, real_of(value))],
        kind if kind.is_json_array() => vec![named(0, json_dump(value))],
        kind if kind.is_text() => vec![named(0, text_of(value))],
        // Formula family and unknown types: direct scalar or JSON fallback
        _ => match value {
            Value::String(s) => vec![named(0, SqlValue::Text(s.clone()))],
            Value::Number(_) | Value::Bool(_) => vec![named(0, text_of(value))],
            other => vec![named(0, json_dump(other))],
        },
    }
}

/// Rebuilds a record shape from a stored row.
///
/// Every mapped field gets a key in the output, including fields whose
/// columns are all NULL; the record id and bookkeeping columns ride along
/// under their own names.
pub fn reconstruct_record(mapping: &TableMapping, row: &Row) -> Value {
    let mut record = Map::new();
    record.insert("id".to_string(), cell(row, "id").clone());

    for entry in &mapping.entries {
        record.insert(entry.slug.clone(), reconstruct_field(entry, row));
    }

    record.insert("cached_at".to_string(), cell(row, "cached_at").clone());
    record.insert("expires_at".to_string(), cell(row, "expires_at").clone());
    Value::Object(record)
}

/// Rebuilds one field value from its columns.
pub fn reconstruct_field(entry: &FieldMapEntry, row: &Row) -> Value {
    let col = |index: usize| cell(row, &entry.columns[index].name);

    match entry.kind() {
        FieldType::FirstCreated | FieldType::LastUpdated | FieldType::DeletedDate => {
            if col(0).is_null() && col(1).is_null() {
                Value::Null
            } else {
                json!({"on": col(0), "by": col(1)})
            }
        }
        FieldType::DateRange => {
            if col(0).is_null() && col(1).is_null() {
                Value::Null
            } else {
                json!({
                    "from_date": date_part(col(0), col(2)),
                    "to_date": date_part(col(1), col(3)),
                })
            }
        }
        FieldType::DueDate => {
            if entry.columns.iter().all(|c| cell(row, &c.name).is_null()) {
                Value::Null
            } else {
                json!({
                    "from_date": date_part(col(0), col(4)),
                    "to_date": date_part(col(1), col(5)),
                    "is_overdue": int_as_bool(col(2)),
                    "status_is_completed": int_as_bool(col(3)),
                })
            }
        }
        FieldType::Status => {
            if col(0).is_null() && col(1).is_null() {
                Value::Null
            } else {
                json!({"value": col(0), "updated_on": col(1)})
            }
        }
        FieldType::Address | FieldType::FullName | FieldType::SmartDoc => decode_json_or_scalar(col(1), col(0)),
        FieldType::Checklist => match decode_json(col(0)) {
            Some(v) => v,
            None if col(0).is_null() => reconstruct_checklist_summary(col(1), col(2)),
            None => col(0).clone(),
        },
        FieldType::Vote => match decode_json(col(1)) {
            Some(v) => v,
            None if col(1).is_null() && !col(0).is_null() => json!({"total_votes": col(0)}),
            None if col(1).is_null() => Value::Null,
            None => col(1).clone(),
        },
        FieldType::TimeTracking => match decode_json(col(0)) {
            Some(v) => v,
            None if col(0).is_null() && !col(1).is_null() => json!({"total_duration": col(1)}),
            None if col(0).is_null() => Value::Null,
            None => col(0).clone(),
        },
        FieldType::YesNo => int_as_bool(col(0)),
        kind if kind.is_json_array() => match decode_json(col(0)) {
            Some(v) => v,
            None if col(0).is_null() => Value::Null,
            // Unparseable dump: hand back the raw string
            None => col(0).clone(),
        },
        FieldType::Formula | FieldType::Lookup | FieldType::Rollup | FieldType::Unknown => match col(0) {
            Value::String(s) if looks_like_json(s) => decode_json(col(0)).unwrap_or_else(|| col(0).clone()),
            other => other.clone(),
        },
        _ => col(0).clone(),
    }
}

/// Reconstructs the remote `{date, include_time}` shape for range ends.
fn date_part(date: &Value, include_time: &Value) -> Value {
    if date.is_null() {
        return Value::Null;
    }
    match include_time {
        Value::Number(_) => json!({"date": date, "include_time": int_as_bool(include_time)}),
        _ => json!({"date": date}),
    }
}

fn reconstruct_checklist_summary(total: &Value, completed: &Value) -> Value {
    if total.is_null() && completed.is_null() {
        Value::Null
    } else {
        json!({"total_items": total, "completed_items": completed})
    }
}

fn decode_json_or_scalar(json_col: &Value, scalar_col: &Value) -> Value {
    match decode_json(json_col) {
        Some(v) => v,
        None if json_col.is_null() => scalar_col.clone(),
        None => json_col.clone(),
    }
}

fn decode_json(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        _ => None,
    }
}

fn looks_like_json(s: &str) -> bool {
    matches!(s.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}

fn int_as_bool(value: &Value) -> Value {
    match value.as_i64() {
        Some(i) => Value::Bool(i != 0),
        None => Value::Null,
    }
}

fn cell<'a>(row: &'a Row, name: &str) -> &'a Value {
    row.get(name).unwrap_or(&Value::Null)
}

fn text_of(value: &Value) -> SqlValue {
    match value {
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Number(n) => SqlValue::Text(n.to_string()),
        Value::Bool(b) => SqlValue::Text(b.to_string()),
        Value::Null => SqlValue::Null,
        other => json_dump(other),
    }
}

fn real_of(value: &Value) -> SqlValue {
    match value {
        Value::Number(n) => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        Value::String(s) => s.trim().parse::<f64>().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        _ => SqlValue::Null,
    }
}

fn int_of(value: &Value) -> SqlValue {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(SqlValue::Integer)
            .unwrap_or(SqlValue::Null),
        Value::String(s) => s.trim().parse::<i64>().map(SqlValue::Integer).unwrap_or(SqlValue::Null),
        _ => SqlValue::Null,
    }
}

/// Booleans are stored as 0/1 integers.
fn bool_int_of(value: &Value) -> SqlValue {
    match value {
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => n.as_i64().map(|i| SqlValue::Integer((i != 0) as i64)).unwrap_or(SqlValue::Null),
        _ => SqlValue::Null,
    }
}

/// Timestamp columns store normalised UTC; an unparseable value is NULL.
fn date_of(value: &Value) -> SqlValue {
    let raw = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("date").and_then(Value::as_str),
        _ => None,
    };
    raw.and_then(timestamp::normalise).map(SqlValue::Text).unwrap_or(SqlValue::Null)
}

/// The `include_time` flag of a `{date, include_time}` hash, as 0/1.
fn include_time_of(value: &Value) -> SqlValue {
    match value {
        Value::Object(map) => map.get("include_time").map(bool_int_of).unwrap_or(SqlValue::Null),
        _ => SqlValue::Null,
    }
}

/// Multi-valued and structured values are stored as their faithful JSON dump.
fn json_dump(value: &Value) -> SqlValue {
    SqlValue::Text(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::fields::RemoteField;
    use crate::libs::schema;

    fn entry(slug: &str, label: &str, field_type: &str) -> FieldMapEntry {
        let mut used = std::collections::HashSet::new();
        schema::synthesise_field(&RemoteField::new(slug, label, field_type), &mut used)
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn extracts_status_object() {
        let e = entry("status", "Status", "statusfield");
        let values = extract_field(&e, &json!({"value": "in_progress", "updated_on": "2025-03-01T10:00:00Z"}));
        assert_eq!(values[0], ("status".to_string(), SqlValue::Text("in_progress".into())));
        assert_eq!(values[1], ("status_updated_on".to_string(), SqlValue::Text("2025-03-01T10:00:00Z".into())));
    }

    #[test]
    fn extracts_due_date_with_flags() {
        let e = entry("due", "Due Date", "duedatefield");
        let value = json!({
            "from_date": {"date": "2025-01-01T00:00:00Z", "include_time": false},
            "to_date": {"date": "2025-01-31T17:00:00Z", "include_time": true},
            "is_overdue": true,
            "status_is_completed": false,
        });
        let values = extract_field(&e, &value);
        assert_eq!(values[0].1, SqlValue::Text("2025-01-01T00:00:00Z".into()));
        assert_eq!(values[1].1, SqlValue::Text("2025-01-31T17:00:00Z".into()));
        assert_eq!(values[2].1, SqlValue::Integer(1));
        assert_eq!(values[3].1, SqlValue::Integer(0));
        assert_eq!(values[4].1, SqlValue::Integer(0));
        assert_eq!(values[5].1, SqlValue::Integer(1));
    }

    #[test]
    fn unparseable_timestamp_becomes_null() {
        let e = entry("created", "Created", "datefield");
        let values = extract_field(&e, &json!("not a timestamp"));
        assert_eq!(values[0].1, SqlValue::Null);
    }

    #[test]
    fn multi_valued_fields_dump_json() {
        let e = entry("tags", "Tags", "multipleselectfield");
        let values = extract_field(&e, &json!(["a", "b"]));
        assert_eq!(values[0].1, SqlValue::Text("[\"a\",\"b\"]".into()));
    }

    #[test]
    fn reconstructs_due_date_shape() {
        let e = entry("due", "Due Date", "duedatefield");
        let r = row(&[
            ("due_date_from", json!("2025-01-01T00:00:00Z")),
            ("due_date_to", json!("2025-01-31T17:00:00Z")),
            ("due_date_is_overdue", json!(1)),
            ("due_date_is_completed", json!(0)),
            ("due_date_from_include_time", json!(0)),
            ("due_date_to_include_time", json!(1)),
        ]);
        let value = reconstruct_field(&e, &r);
        assert_eq!(value["is_overdue"], json!(true));
        assert_eq!(value["from_date"]["include_time"], json!(false));
        assert_eq!(value["to_date"]["date"], json!("2025-01-31T17:00:00Z"));
    }

    #[test]
    fn round_trip_preserves_null_empty_and_zero() {
        let catalog = vec![
            RemoteField::new("name", "Name", "textfield"),
            RemoteField::new("count", "Count", "numberfield"),
            RemoteField::new("tags", "Tags", "multipleselectfield"),
        ];
        let mapping = schema::synthesise(&catalog);
        let record = json!({"id": "rec1", "name": "", "count": 0.0, "tags": []});

        let mut r: Row = extract_record(&mapping, &record)
            .into_iter()
            .map(|(name, v)| {
                let cell = match v {
                    SqlValue::Null => Value::Null,
                    SqlValue::Text(s) => json!(s),
                    SqlValue::Real(f) => json!(f),
                    SqlValue::Integer(i) => json!(i),
                };
                (name, cell)
            })
            .collect();
        r.insert("id".to_string(), json!("rec1"));

        let rebuilt = reconstruct_record(&mapping, &r);
        assert_eq!(rebuilt["name"], json!(""));
        assert_eq!(rebuilt["count"], json!(0.0));
        assert_eq!(rebuilt["tags"], json!([]));
    }

    #[test]
    fn bad_json_dump_reconstructs_as_raw_string() {
        let e = entry("tags", "Tags", "multipleselectfield");
        let r = row(&[("tags", json!("not [ json"))]);
        assert_eq!(reconstruct_field(&e, &r), json!("not [ json"));
    }
}
