//! Translation of the remote filter DSL into query-builder calls.
//!
//! The remote API expresses filters as `and`/`or` groups of
//! `{field, comparison, value}` leaves, with groups nesting arbitrarily:
//!
//! ```text
//! {"operator": "or", "fields": [
//!     {"operator": "and", "fields": [
//!         {"field": "status", "comparison": "is", "value": "active"},
//!         {"field": "priority", "comparison": "is", "value": "high"}
//!     ]},
//!     {"field": "overdue", "comparison": "is", "value": true}
//! ]}
//! ```
//!
//! Flat all-leaf `and` groups become plain `where_` chains; anything with
//! an `or` or a nested group is assembled into a parenthesised fragment
//! from the builder's own condition primitives and attached via
//! `where_raw`, so every value still binds as a parameter.

use crate::libs::codec::SqlValue;
use crate::libs::messages::Message;
use crate::libs::query::QueryBuilder;
use crate::libs::timestamp;
use crate::libs::validator::{self, Validity};
use crate::{msg_debug, msg_error_anyhow};
use anyhow::Result;
use serde_json::{json, Value};

/// Applies a remote filter document to the builder.
///
/// With `strict` set, an invalid `(field, operator)` pair aborts with a
/// user-visible error carrying the suggested operator; otherwise the
/// offending clause is skipped. Unknown fields are always skipped.
pub fn apply<'conn>(mut builder: QueryBuilder<'conn>, filter: &Value, strict: bool) -> Result<QueryBuilder<'conn>> {
    let Some(fields) = filter.get("fields").and_then(Value::as_array) else {
        return Ok(builder);
    };
    let operator = filter.get("operator").and_then(Value::as_str).unwrap_or("and");

    if operator.eq_ignore_ascii_case("or") {
        if let Some((clause, params)) = group_fragment(&builder, filter, strict)? {
            builder = builder.where_raw(clause, params);
        }
        return Ok(builder);
    }

    for entry in fields {
        if entry.get("fields").is_some() {
            // Nested group inside a flat AND chain
            if let Some((clause, params)) = group_fragment(&builder, entry, strict)? {
                builder = builder.where_raw(clause, params);
            }
        } else if let Some((path, spec)) = leaf_condition(&builder, entry, strict)? {
            builder = builder.where_(&json!({ path: spec }));
        }
    }
    Ok(builder)
}

/// Builds a parenthesised SQL fragment for a (possibly nested) group.
fn group_fragment(builder: &QueryBuilder<'_>, group: &Value, strict: bool) -> Result<Option<(String, Vec<SqlValue>)>> {
    let Some(fields) = group.get("fields").and_then(Value::as_array) else {
        return Ok(None);
    };
    let joiner = if group.get("operator").and_then(Value::as_str).unwrap_or("and").eq_ignore_ascii_case("or") {
        " OR "
    } else {
        " AND "
    };

    let mut clauses = Vec::new();
    let mut params = Vec::new();

    for entry in fields {
        if entry.get("fields").is_some() {
            if let Some((clause, mut bound)) = group_fragment(builder, entry, strict)? {
                clauses.push(clause);
                params.append(&mut bound);
            }
        } else if let Some((path, spec)) = leaf_condition(builder, entry, strict)? {
            if let Some((clause, mut bound)) = builder.condition(&path, &spec) {
                clauses.push(clause);
                params.append(&mut bound);
            }
        }
    }

    if clauses.is_empty() {
        return Ok(None);
    }
    Ok(Some((format!("({})", clauses.join(joiner)), params)))
}

/// Translates one DSL leaf into a builder condition `(path, spec)`.
///
/// Returns `None` when the leaf should be skipped (unknown field, or an
/// invalid operator outside strict mode).
fn leaf_condition(builder: &QueryBuilder<'_>, leaf: &Value, strict: bool) -> Result<Option<(String, Value)>> {
    let Some(field) = leaf.get("field").and_then(Value::as_str) else {
        return Ok(None);
    };
    let comparison = leaf.get("comparison").and_then(Value::as_str).unwrap_or("is");
    let value = leaf.get("value").cloned().unwrap_or(Value::Null);

    // Validate only when the field resolves to a known type and the
    // operator is part of the DSL; formula-family and unknown types come
    // back as Unknown and are never blocked, and unknown comparisons fall
    // through to raw equality below
    if let Some(kind) = builder.field_type(field).filter(|_| validator::is_known_operator(comparison)) {
        match validator::validate(kind, comparison) {
            Validity::Invalid { suggestion } if strict => {
                return Err(msg_error_anyhow!(Message::FilterOperatorInvalid {
                    field: field.to_string(),
                    operator: comparison.to_string(),
                    suggestion,
                }));
            }
            Validity::Invalid { .. } => {
                msg_debug!(Message::FilterOperatorInvalid {
                    field: field.to_string(),
                    operator: comparison.to_string(),
                    suggestion: None,
                });
                return Ok(None);
            }
            Validity::Valid | Validity::Unknown => {}
        }
    }

    let spec = match comparison {
        "is" | "is_equal_to" => match date_only_value(&value).and_then(|day| timestamp::day_bounds(&day)) {
            // Equality on a calendar day means the whole day in UTC
            Some((min, max)) => json!({"between": {"min": min, "max": max}}),
            None => normalised_literal(&value),
        },
        "is_not" | "is_not_equal_to" => match date_only_value(&value).and_then(|day| timestamp::day_bounds(&day)) {
            Some((min, max)) => json!({"not_between": {"min": min, "max": max}}),
            None => json!({"ne": value}),
        },
        "is_greater_than" => json!({"gt": normalised_operand(&value)}),
        "is_less_than" => json!({"lt": normalised_operand(&value)}),
        "is_equal_or_greater_than" => json!({"gte": normalised_operand(&value)}),
        "is_equal_or_less_than" => json!({"lte": normalised_operand(&value)}),
        "contains" => json!({"contains": value}),
        "not_contains" | "does_not_contain" => json!({"not_contains": value}),
        "is_empty" => json!({"is_empty": true}),
        "is_not_empty" => json!({"is_not_empty": true}),
        "is_any_of" => json!({"is_any_of": value}),
        "is_none_of" => json!({"is_none_of": value}),
        "has_any_of" => json!({"has_any_of": value}),
        "has_all_of" => json!({"has_all_of": value}),
        "has_none_of" => json!({"has_none_of": value}),
        "is_exactly" => json!({"is_exactly": value}),
        "is_before" | "is_on_or_before" | "is_on_or_after" => {
            // The value may arrive wrapped in a {date_mode, date_mode_value}
            // object; either way the operator name is preserved so range
            // fields keep targeting their _to column
            let date = wrapped_date(&value).unwrap_or(value.clone());
            json!({ comparison: normalised_operand(&date) })
        }
        "is_overdue" => json!({"is_overdue": true}),
        "is_not_overdue" => json!({"is_not_overdue": true}),
        "file_name_contains" => json!({"file_name_contains": value}),
        "file_type_is" => json!({"file_type_is": value}),
        // Unknown comparison: fall back to raw equality
        _ => value,
    };

    Ok(Some((field.to_string(), spec)))
}

/// A calendar-day string hiding in the leaf value, if any.
fn date_only_value(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("date").and_then(Value::as_str)?,
        _ => return None,
    };
    timestamp::is_date_only(s).then(|| s.to_string())
}

/// Unwraps `{date_mode, date_mode_value}` comparison values.
fn wrapped_date(value: &Value) -> Option<Value> {
    value.get("date_mode_value").cloned()
}

/// Normalises timestamp operands to stored UTC; leaves the rest alone.
fn normalised_operand(value: &Value) -> Value {
    match value {
        Value::String(s) => timestamp::normalise(s).map(Value::from).unwrap_or_else(|| value.clone()),
        Value::Object(map) => map
            .get("date")
            .and_then(Value::as_str)
            .and_then(timestamp::normalise)
            .map(Value::from)
            .unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}

/// Equality operand for `is`: timestamps normalise, everything else binds
/// as given.
fn normalised_literal(value: &Value) -> Value {
    match value {
        Value::String(s) if timestamp::is_timestamp(s) => timestamp::normalise(s).map(Value::from).unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}
