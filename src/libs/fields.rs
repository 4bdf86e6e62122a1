//! Field type catalog for remote workspace tables.
//!
//! The remote API describes every table with a self-describing field catalog.
//! This module maps the wire-level field type codes onto a closed enum so the
//! rest of the engine (column synthesis, value extraction, filter validation)
//! can dispatch on a typed value instead of inspecting strings everywhere.
//!
//! Unknown codes never fail: they map to [`FieldType::Unknown`], which is
//! stored as text with a JSON fallback.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single field descriptor as delivered by the remote API.
///
/// Fields are immutable from the engine's viewpoint: the engine never edits a
/// catalog, it only diffs catalogs between cache writes to evolve the local
/// schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteField {
    /// Stable machine identifier, unique within a table.
    pub slug: String,
    /// Human-readable label, preferred source for local column names.
    #[serde(default)]
    pub label: String,
    /// Wire-level type code, e.g. `"statusfield"`.
    pub field_type: String,
    /// Optional parameter map (`primary`, `required`, `choices`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RemoteField {
    pub fn new(slug: &str, label: &str, field_type: &str) -> Self {
        Self {
            slug: slug.to_string(),
            label: label.to_string(),
            field_type: field_type.to_string(),
            params: None,
        }
    }

    /// Resolves the wire code to the typed catalog entry.
    pub fn kind(&self) -> FieldType {
        FieldType::from_code(&self.field_type)
    }

    /// Whether the field is flagged as the table's primary field.
    pub fn is_primary(&self) -> bool {
        self.params
            .as_ref()
            .and_then(|p| p.get("primary"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Closed set of field types understood by the engine.
///
/// The variants mirror the remote API's type codes one-to-one. Every variant
/// declares its column layout in `libs::schema` and its value mapping in
/// `libs::codec`; anything not in the catalog becomes `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    // Single-column text scalars
    Text,
    TextArea,
    Title,
    Email,
    Phone,
    Link,
    SingleSelect,
    Time,
    IpAddress,
    ColorPicker,
    SocialNetwork,
    Button,
    RecordId,
    ApplicationSlug,
    ApplicationId,
    // Single-column numeric scalars
    Number,
    Currency,
    Percent,
    Rating,
    NumberSlider,
    PercentComplete,
    Duration,
    AutoNumber,
    CommentsCount,
    YesNo,
    // Dates
    Date,
    // Multi-valued, stored as a JSON array in one text column
    MultipleSelect,
    Tag,
    AssignedTo,
    User,
    LinkedRecord,
    Files,
    Images,
    Signature,
    FollowedBy,
    // Compound, multi-column
    FirstCreated,
    LastUpdated,
    DeletedDate,
    DateRange,
    DueDate,
    Status,
    Address,
    FullName,
    SmartDoc,
    Checklist,
    Vote,
    TimeTracking,
    // Formula family: effective type depends on the expression
    Formula,
    Lookup,
    Rollup,
    // Anything the catalog does not know
    Unknown,
}

impl FieldType {
    /// Maps a wire type code onto the catalog.
    pub fn from_code(code: &str) -> Self {
        match code {
            "textfield" => Self::Text,
            "textarea" | "textareafield" => Self::TextArea,
            "title" => Self::Title,
            "emailfield" => Self::Email,
            "phonefield" => Self::Phone,
            "linkfield" => Self::Link,
            "singleselectfield" => Self::SingleSelect,
            "timefield" => Self::Time,
            "ipaddressfield" => Self::IpAddress,
            "colorpickerfield" => Self::ColorPicker,
            "socialnetworkfield" => Self::SocialNetwork,
            "buttonfield" => Self::Button,
            "record_id" => Self::RecordId,
            "application_slug" => Self::ApplicationSlug,
            "application_id" => Self::ApplicationId,
            "numberfield" => Self::Number,
            "currencyfield" => Self::Currency,
            "percentfield" => Self::Percent,
            "ratingfield" => Self::Rating,
            "numbersliderfield" => Self::NumberSlider,
            "percentcompletefield" => Self::PercentComplete,
            "durationfield" => Self::Duration,
            "autonumber" => Self::AutoNumber,
            "comments_count" => Self::CommentsCount,
            "yesnofield" => Self::YesNo,
            "datefield" => Self::Date,
            "multipleselectfield" => Self::MultipleSelect,
            "tagfield" => Self::Tag,
            "assignedtofield" => Self::AssignedTo,
            "userfield" => Self::User,
            "linkedrecordfield" => Self::LinkedRecord,
            "filesfield" | "filefield" => Self::Files,
            "imagesfield" => Self::Images,
            "signaturefield" => Self::Signature,
            "followed_by" => Self::FollowedBy,
            "firstcreatedfield" => Self::FirstCreated,
            "lastupdatedfield" => Self::LastUpdated,
            "deleted_date" => Self::DeletedDate,
            "daterangefield" => Self::DateRange,
            "duedatefield" => Self::DueDate,
            "statusfield" => Self::Status,
            "addressfield" => Self::Address,
            "fullnamefield" => Self::FullName,
            "smartdocfield" => Self::SmartDoc,
            "checklistfield" => Self::Checklist,
            "votefield" => Self::Vote,
            "timetrackingfield" => Self::TimeTracking,
            "formulafield" => Self::Formula,
            "lookupfield" => Self::Lookup,
            "rollupfield" => Self::Rollup,
            _ => Self::Unknown,
        }
    }

    /// Text scalars, by exact membership.
    ///
    /// Membership tests are always exact: substring matching would
    /// misclassify `linkedrecordfield` as a text field.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::TextArea
                | Self::Title
                | Self::Email
                | Self::Phone
                | Self::Link
                | Self::SingleSelect
                | Self::Time
                | Self::IpAddress
                | Self::ColorPicker
                | Self::SocialNetwork
                | Self::Button
                | Self::RecordId
                | Self::ApplicationSlug
                | Self::ApplicationId
        )
    }

    /// Numeric scalars stored as REAL.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Number | Self::Currency | Self::Percent | Self::Rating | Self::NumberSlider | Self::PercentComplete | Self::Duration
        )
    }

    /// Fields whose value is a JSON array stored in a single text column.
    ///
    /// This set drives the empty-value semantics of the query layer:
    /// `is_empty` on these columns must match both NULL and the literal
    /// `'[]'`, and the `has_*` set operators only apply here.
    pub fn is_json_array(&self) -> bool {
        matches!(
            self,
            Self::MultipleSelect
                | Self::Tag
                | Self::AssignedTo
                | Self::User
                | Self::LinkedRecord
                | Self::Files
                | Self::Images
                | Self::Signature
                | Self::FollowedBy
        )
    }

    /// Date-range shaped fields carrying `_from`/`_to` sub-columns.
    pub fn is_range(&self) -> bool {
        matches!(self, Self::DateRange | Self::DueDate)
    }

    /// Formula-family fields whose effective type depends on the expression.
    ///
    /// These cannot be validated against the operator catalog; the validator
    /// reports "unknown" for them instead of blocking the filter.
    pub fn is_formula_family(&self) -> bool {
        matches!(self, Self::Formula | Self::Lookup | Self::Rollup)
    }

    /// Field types that always receive an index on their primary column(s).
    pub fn always_indexed(&self) -> bool {
        matches!(
            self,
            Self::Status
                | Self::SingleSelect
                | Self::Date
                | Self::DueDate
                | Self::DateRange
                | Self::Currency
                | Self::LastUpdated
                | Self::AssignedTo
                | Self::YesNo
        )
    }
}
