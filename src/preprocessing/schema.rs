//! Column roles and the raw record representation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Numeric feature columns, in feature-vector order.
pub const NUMERIC_FEATURES: [&str; 9] = [
    "top_speed_kmh",
    "battery_capacity_kWh",
    "torque_nm",
    "acceleration_0_100_s",
    "fast_charging_power_kw_dc",
    "seats",
    "length_mm",
    "width_mm",
    "height_mm",
];

/// Categorical feature columns, in one-hot block order.
pub const CATEGORICAL_FEATURES: [&str; 2] = ["fast_charge_port", "drivetrain"];

/// Regression target column.
pub const TARGET: &str = "range_km";

/// One cell of tabular input.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Coerces a raw cell: empty is `Missing`, a finite number is `Number`,
    /// anything else is kept as `Text`.
    pub fn parse(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            return Value::Missing;
        }
        match cell.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(cell.to_string()),
        }
    }

    /// Finite numeric value, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// Categorical form: text as-is, numbers through their display form.
    pub fn as_category(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) if n.is_finite() => Some(n.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Missing => f.write_str("<missing>"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// One source row: column name → cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRecord {
    fields: HashMap<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(column.into(), value.into());
    }

    /// Builder-style [`RawRecord::insert`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.fields.remove(column)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds a record from a JSON object. `null` becomes `Missing`; strings are
    /// coerced like CSV cells so form input such as `"5"` counts as a number.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut record = RawRecord::new();
        for (key, v) in object {
            let cell = match v {
                serde_json::Value::Null => Value::Missing,
                serde_json::Value::Number(n) => n.as_f64().map_or(Value::Missing, Value::Number),
                serde_json::Value::String(s) => Value::parse(s),
                other => Value::Text(other.to_string()),
            };
            record.insert(key.clone(), cell);
        }
        Some(record)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Fixed column roles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub target: String,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::ev()
    }
}

impl FeatureSchema {
    /// The electric-vehicle specification schema.
    pub fn ev() -> Self {
        Self {
            numeric: NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect(),
            categorical: CATEGORICAL_FEATURES.iter().map(|s| s.to_string()).collect(),
            target: TARGET.to_string(),
        }
    }

    /// Input features followed by the target.
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.features().chain(std::iter::once(self.target.as_str()))
    }

    /// Input features: numeric first, then categorical.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .iter()
            .chain(self.categorical.iter())
            .map(String::as_str)
    }

    /// Required columns absent from `record`, in schema order.
    pub fn missing_columns(&self, record: &RawRecord) -> Vec<String> {
        self.required_columns()
            .filter(|c| !record.contains(c))
            .map(str::to_string)
            .collect()
    }
}
