//! Core data types for DataForge-RS
//!
//! This module contains the tabular data model every pipeline node reads and
//! produces: dynamically-typed cell values, rows, inferred columns and the
//! dataset container itself.
//!
//! # Main Types
//!
//! - [`Value`] - A scalar cell value (null, boolean, number or string)
//! - [`Row`] - An ordered mapping from column name to [`Value`]
//! - [`Column`] - Inferred column metadata (type, nullability, uniqueness)
//! - [`Dataset`] - Identity, provenance, columns and rows
//!
//! # Schema Inference
//!
//! Columns are always derived from the first row of a dataset
//! ([`infer_columns`]). Every operator re-infers the schema of its output, so a
//! dataset's declared columns never drift from its data. Inference never fails:
//! anything ambiguous is reported as [`ColumnType::String`].
//!
//! # Coercion
//!
//! Numeric coercion follows the lenient rules the pipeline has always used:
//! [`Value::parse_float`] reads the longest numeric prefix of a string, and
//! [`Value::coerce_number`] additionally maps anything unparseable to `0`.

use crate::pipeline::node_type::NodeType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

/// A single row: column name to value, in insertion order.
pub type Row = IndexMap<String, Value>;

/// Shared null used when a row has no entry for a column.
pub(crate) static NULL_VALUE: Value = Value::Null;

/// Largest integer magnitude that is exactly representable in an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A dynamically-typed scalar cell value.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent or explicit null
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (integers are stored as whole floats)
    Number(f64),
    /// Text value
    String(String),
}

impl Value {
    /// True for null, absent and empty-string values.
    pub fn is_null_like(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Borrow the text if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the number if this is a numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Stringified form used for containment checks and grouping keys.
    ///
    /// Null stringifies to the empty string.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Bool(true) => Cow::Borrowed("true"),
            Value::Bool(false) => Cow::Borrowed("false"),
            Value::Number(n) => Cow::Owned(format_number(*n)),
            Value::String(s) => Cow::Borrowed(s),
        }
    }

    /// Lenient numeric parse: numbers pass through, strings yield their
    /// longest numeric prefix, everything else is `NaN`.
    pub fn parse_float(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::String(s) => parse_float_prefix(s),
            Value::Bool(_) | Value::Null => f64::NAN,
        }
    }

    /// Numeric coercion used by aggregations and expressions: like
    /// [`parse_float`](Self::parse_float) but failed parses become `0`.
    pub fn coerce_number(&self) -> f64 {
        let n = self.parse_float();
        if n.is_nan() {
            0.0
        } else {
            n
        }
    }

    /// Loose equality with type coercion between numbers, numeric strings and
    /// booleans. Null only equals null.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(b), other) | (other, Value::Bool(b)) => {
                Value::Number(if *b { 1.0 } else { 0.0 }).loose_eq(other)
            }
            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
                strict_number(s).is_some_and(|parsed| parsed == *n)
            }
        }
    }

    /// Strict equality used for join keys. Null, including an absent
    /// column, matches only null.
    pub fn join_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Total order used by the sort operator.
    ///
    /// Values of different types order as null < boolean < number < string.
    /// `NaN` sorts after every other number.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => match (a.is_nan(), b.is_nan()) {
                (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
                (a_nan, b_nan) => a_nan.cmp(&b_nan),
            },
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            // serde_json writes non-finite floats as null
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a [`Row`] from `(column, value)` pairs.
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Look up a cell, treating a missing column as null.
pub fn cell<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&NULL_VALUE)
}

/// Format a number the way it appears in stringified keys and column names.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        // -0 prints as 0
        format!("{:.0}", if n == 0.0 { 0.0 } else { n })
    } else {
        format!("{}", n)
    }
}

/// Parse the longest numeric prefix of `s` (after leading whitespace).
///
/// Returns `NaN` when no digits are found.
pub fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let len = numeric_prefix_len(s);
    if len == 0 {
        let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
        if unsigned.starts_with("Infinity") {
            return if s.starts_with('-') {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
        }
        return f64::NAN;
    }
    s[..len].parse().unwrap_or(f64::NAN)
}

/// Parse a whole string as a number. Blank strings are zero.
fn strict_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    if numeric_prefix_len(trimmed) != trimmed.len() {
        return None;
    }
    trimmed.parse().ok()
}

/// Byte length of the `[sign] digits [. digits] [e [sign] digits]` prefix.
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

/// Inferred scalar type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Text, and the fallback for anything ambiguous
    #[default]
    String,
    /// Numeric values and numeric-looking strings
    Number,
    /// Booleans
    Boolean,
    /// ISO-8601 dates and RFC 3339 timestamps
    Date,
}

impl ColumnType {
    /// Lowercase name as used in serialized schemas.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column metadata derived by schema inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    #[serde(default = "default_true")]
    pub nullable: bool,

    #[serde(default)]
    pub unique: bool,

    /// Informational number flavor: `integer` or `decimal`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Column {
    /// Create a nullable, non-unique column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            unique: false,
            format: None,
        }
    }

    fn inferred(name: &str, value: &Value) -> Self {
        let mut column = Column::new(name, infer_value_type(value));
        column.format = number_format(value).map(str::to_string);
        column
    }
}

/// Classify a single value.
pub fn infer_value_type(value: &Value) -> ColumnType {
    match value {
        Value::Bool(_) => ColumnType::Boolean,
        Value::Number(_) => ColumnType::Number,
        Value::Null => ColumnType::String,
        Value::String(s) => {
            if s.trim().is_empty() {
                ColumnType::String
            } else if strict_number(s).is_some() {
                ColumnType::Number
            } else if looks_like_date(s) {
                ColumnType::Date
            } else {
                ColumnType::String
            }
        }
    }
}

fn number_format(value: &Value) -> Option<&'static str> {
    match value {
        Value::Number(n) if n.fract() == 0.0 => Some("integer"),
        Value::Number(_) => Some("decimal"),
        Value::String(s) if infer_value_type(value) == ColumnType::Number => {
            Some(if s.contains('.') { "decimal" } else { "integer" })
        }
        _ => None,
    }
}

fn looks_like_date(s: &str) -> bool {
    let s = s.trim();
    if s.len() <= 8 {
        return false;
    }
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
}

/// Derive a column list from the first row.
///
/// Nullability and uniqueness are left at their defaults; only the first row
/// is inspected.
pub fn infer_columns(rows: &[Row]) -> Vec<Column> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    first
        .iter()
        .map(|(name, value)| Column::inferred(name, value))
        .collect()
}

/// How a dataset came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Parsed from a CSV upload
    Csv,
    /// Parsed from a JSON upload
    Json,
    /// Parsed from an Excel workbook
    Excel,
    /// Fetched from an API
    Api,
    /// Read from a database
    Database,
    /// Entered by hand
    #[default]
    Manual,
    /// Produced by a pipeline node of the given kind
    Operator(NodeType),
}

/// An in-memory table: identity, provenance, inferred columns and rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub provenance: Provenance,

    #[serde(default)]
    pub columns: Vec<Column>,

    #[serde(default, alias = "data")]
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Create a dataset, inferring its columns from `rows`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        provenance: Provenance,
        rows: Vec<Row>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provenance,
            columns: infer_columns(&rows),
            rows,
        }
    }

    /// Produce a dataset with this dataset's identity but new rows.
    ///
    /// Columns are re-inferred from the new rows.
    pub fn derive(&self, provenance: Provenance, rows: Vec<Row>) -> Self {
        Self::new(self.id.clone(), self.name.clone(), provenance, rows)
    }

    /// Recompute `columns` from the current rows.
    pub fn refresh_columns(&mut self) {
        self.columns = infer_columns(&self.rows);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declared order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}
