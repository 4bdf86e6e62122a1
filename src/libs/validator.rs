//! Field-type-aware validation of filter operators.
//!
//! The remote filter DSL allows ≈30 comparison operators, but most of them
//! only make sense for some field types: `has_any_of` needs a multi-valued
//! field, `is_overdue` needs a due date, and so on. The validator answers
//! "is this (field type, operator) pair legal" and, where a canonical
//! replacement exists, suggests it instead of just rejecting.
//!
//! Formula-family fields (`formulafield`, `lookupfield`, `rollupfield`)
//! evaluate to a type the engine cannot know without the expression, so they
//! are never blocked; unknown field types get the same pass.

use crate::libs::fields::FieldType;

/// Operators valid for any field type.
const COMMON_OPERATORS: &[&str] = &["is", "is_not", "is_equal_to", "is_not_equal_to", "is_empty", "is_not_empty"];

const ORDERING_OPERATORS: &[&str] = &["is_greater_than", "is_less_than", "is_equal_or_greater_than", "is_equal_or_less_than"];

const TEXT_OPERATORS: &[&str] = &["contains", "not_contains", "does_not_contain"];

const DATE_OPERATORS: &[&str] = &["is_before", "is_on_or_before", "is_on_or_after", "between", "not_between"];

const SINGLE_SELECT_OPERATORS: &[&str] = &["is_any_of", "is_none_of"];

const MULTI_SELECT_OPERATORS: &[&str] = &["has_any_of", "has_all_of", "is_exactly", "has_none_of"];

const FILE_OPERATORS: &[&str] = &["file_name_contains", "file_type_is"];

const DUE_DATE_OPERATORS: &[&str] = &["is_overdue", "is_not_overdue"];

/// Whether an operator belongs to the filter DSL at all.
///
/// Comparisons outside the catalog are not validated; the translator
/// passes their raw value through as equality instead of blocking them.
pub fn is_known_operator(operator: &str) -> bool {
    COMMON_OPERATORS.contains(&operator)
        || ORDERING_OPERATORS.contains(&operator)
        || TEXT_OPERATORS.contains(&operator)
        || DATE_OPERATORS.contains(&operator)
        || SINGLE_SELECT_OPERATORS.contains(&operator)
        || MULTI_SELECT_OPERATORS.contains(&operator)
        || FILE_OPERATORS.contains(&operator)
        || DUE_DATE_OPERATORS.contains(&operator)
}

/// Outcome of validating one `(field_type, operator)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Validity {
    /// The pair is legal.
    Valid,
    /// The pair is illegal; a canonical replacement may exist.
    Invalid { suggestion: Option<String> },
    /// The field's effective type cannot be known; do not block.
    Unknown,
}

impl Validity {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Validity::Invalid { .. })
    }
}

/// The set of legal operators for a field type.
///
/// Formula-family and unknown types return `None`: their operator set is
/// undecidable, not empty.
pub fn operators_for(kind: FieldType) -> Option<Vec<&'static str>> {
    if kind.is_formula_family() || kind == FieldType::Unknown {
        return None;
    }

    let mut ops: Vec<&'static str> = COMMON_OPERATORS.to_vec();

    if kind.is_json_array() {
        ops.extend(MULTI_SELECT_OPERATORS);
        if kind == FieldType::Files || kind == FieldType::Images {
            ops.extend(FILE_OPERATORS);
        }
        // Plain equality is replaced by set operators for multi-valued
        // fields; keep is_empty/is_not_empty from the common set
        ops.retain(|op| !matches!(*op, "is" | "is_not" | "is_equal_to" | "is_not_equal_to"));
        return Some(ops);
    }

    match kind {
        FieldType::SingleSelect => ops.extend(SINGLE_SELECT_OPERATORS),
        FieldType::Status => {
            ops.extend(SINGLE_SELECT_OPERATORS);
        }
        FieldType::Date | FieldType::DateRange | FieldType::FirstCreated | FieldType::LastUpdated | FieldType::DeletedDate => {
            ops.extend(DATE_OPERATORS);
            ops.extend(ORDERING_OPERATORS);
        }
        FieldType::DueDate => {
            ops.extend(DATE_OPERATORS);
            ops.extend(ORDERING_OPERATORS);
            ops.extend(DUE_DATE_OPERATORS);
        }
        FieldType::Time => ops.extend(ORDERING_OPERATORS),
        FieldType::YesNo => {}
        kind if kind.is_numeric() => ops.extend(ORDERING_OPERATORS),
        FieldType::AutoNumber | FieldType::CommentsCount => ops.extend(ORDERING_OPERATORS),
        kind if kind.is_text() => ops.extend(TEXT_OPERATORS),
        // Remaining compound types (address, full name, smart doc, ...)
        // search through their text column
        _ => ops.extend(TEXT_OPERATORS),
    }

    Some(ops)
}

/// Validates one pair, suggesting the canonical replacement when one exists.
pub fn validate(kind: FieldType, operator: &str) -> Validity {
    let Some(ops) = operators_for(kind) else {
        return Validity::Unknown;
    };

    if ops.contains(&operator) {
        return Validity::Valid;
    }

    Validity::Invalid { suggestion: suggest(kind, operator) }
}

/// Canonical replacements for the common mistakes.
fn suggest(kind: FieldType, operator: &str) -> Option<String> {
    // Plain equality on a multi-valued field means set intersection
    if kind.is_json_array() && matches!(operator, "is" | "is_equal_to") {
        return Some("has_any_of".to_string());
    }
    if kind.is_json_array() && matches!(operator, "is_not" | "is_not_equal_to") {
        return Some("has_none_of".to_string());
    }
    // Multi-select set operators on a single select collapse to membership
    if matches!(kind, FieldType::SingleSelect | FieldType::Status) && operator == "has_any_of" {
        return Some("is_any_of".to_string());
    }
    if matches!(kind, FieldType::SingleSelect | FieldType::Status) && operator == "has_none_of" {
        return Some("is_none_of".to_string());
    }
    // Numeric ordering on text means the caller wanted equality
    if kind.is_text() && ORDERING_OPERATORS.contains(&operator) {
        return Some("is".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_valid_everywhere_but_multiselect() {
        assert_eq!(validate(FieldType::Text, "is"), Validity::Valid);
        assert_eq!(validate(FieldType::Number, "is"), Validity::Valid);
        assert!(validate(FieldType::MultipleSelect, "is").is_blocking());
    }

    #[test]
    fn multi_select_equality_suggests_set_operator() {
        let v = validate(FieldType::MultipleSelect, "is");
        assert_eq!(
            v,
            Validity::Invalid {
                suggestion: Some("has_any_of".to_string())
            }
        );
    }

    #[test]
    fn numeric_ordering_on_text_suggests_is() {
        let v = validate(FieldType::Text, "is_greater_than");
        assert_eq!(v, Validity::Invalid { suggestion: Some("is".to_string()) });
    }

    #[test]
    fn has_any_of_on_single_select_suggests_is_any_of() {
        let v = validate(FieldType::SingleSelect, "has_any_of");
        assert_eq!(
            v,
            Validity::Invalid {
                suggestion: Some("is_any_of".to_string())
            }
        );
    }

    #[test]
    fn formula_family_is_never_blocked() {
        assert_eq!(validate(FieldType::Formula, "has_any_of"), Validity::Unknown);
        assert_eq!(validate(FieldType::Lookup, "is_overdue"), Validity::Unknown);
        assert_eq!(validate(FieldType::Unknown, "anything"), Validity::Unknown);
    }

    #[test]
    fn due_date_supports_overdue_operators() {
        assert_eq!(validate(FieldType::DueDate, "is_overdue"), Validity::Valid);
        assert!(validate(FieldType::Date, "is_overdue").is_blocking());
    }
}
