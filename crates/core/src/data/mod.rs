use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Event, Result, SceneError};

/// A value that can be stored in scene data or in an experiment row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Events(Vec<Event>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "a bool",
            Self::Int(_) => "an integer",
            Self::Float(_) => "a float",
            Self::Text(_) => "text",
            Self::Events(_) => "an event list",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_events(&self) -> Option<&[Event]> {
        match self {
            Self::Events(events) => Some(events),
            _ => None,
        }
    }

    /// Rendering used for CSV cells.
    fn to_cell(&self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Text(value) => value.clone(),
            Self::Events(events) => events
                .iter()
                .map(|event| format!("{}@{:.4}", event.name, event.rt))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

macro_rules! value_from {
    ($variant:ident: $($ty:ty => $conv:expr),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant($conv(value))
                }
            }
        )+
    };
}

value_from!(Bool: bool => std::convert::identity);
value_from!(Int: i64 => std::convert::identity, i32 => i64::from, u32 => i64::from);
value_from!(Float: f64 => std::convert::identity, f32 => f64::from);
value_from!(Text: String => std::convert::identity, &str => str::to_string);
value_from!(Events: Vec<Event> => std::convert::identity);

/// One named-field row of experiment data.
pub type Row = BTreeMap<String, Value>;

/// Per-scene key/value store. `show_time` and `events` are written by the
/// scene lifecycle and are otherwise ordinary entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataCollector {
    data: BTreeMap<String, Value>,
}

impl DataCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.data
            .get(key)
            .ok_or_else(|| SceneError::KeyNotFound(key.to_string()))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        let value = self.get(key)?;
        value.as_f64().ok_or_else(|| mismatch(key, "a number", value))
    }

    pub fn get_str(&self, key: &str) -> Result<&str> {
        let value = self.get(key)?;
        value.as_str().ok_or_else(|| mismatch(key, "text", value))
    }

    pub fn get_events(&self, key: &str) -> Result<&[Event]> {
        let value = self.get(key)?;
        value.as_events().ok_or_else(|| mismatch(key, "an event list", value))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Appends to the event list stored under `key`, creating it if needed.
    pub(crate) fn push_event(&mut self, key: &str, event: Event) {
        match self.data.get_mut(key) {
            Some(Value::Events(events)) => events.push(event),
            _ => {
                self.data.insert(key.to_string(), Value::Events(vec![event]));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(key, value)| (key.as_str(), value))
    }
}

fn mismatch(key: &str, expected: &'static str, found: &Value) -> SceneError {
    SceneError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Shared experiment-wide data sink. Rows are appended by
/// `Context::add_row` and exported once the session ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperimentData {
    /// Column names in order of first appearance.
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl ExperimentData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row<K, V, I>(&mut self, fields: I)
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = Row::new();
        for (key, value) in fields {
            let key = key.into();
            if !self.columns.contains(&key) {
                self.columns.push(key.clone());
            }
            row.insert(key, value.into());
        }
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders all rows as CSV. Missing cells are left empty.
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.columns.iter().map(|c| csv_escape(c)).collect();
        let _ = writeln!(out, "{}", header.join(","));
        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|column| {
                    row.get(column)
                        .map(|value| csv_escape(&value.to_cell()))
                        .unwrap_or_default()
                })
                .collect();
            let _ = writeln!(out, "{}", cells.join(","));
        }
        out
    }

    /// Renders all rows as a JSON array of objects.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.rows)?)
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_csv_string())?;
        tracing::info!(
            path = %path.display(),
            rows = self.rows.len(),
            "saved experiment data as csv"
        );
        Ok(())
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string()?)?;
        tracing::info!(
            path = %path.display(),
            rows = self.rows.len(),
            "saved experiment data as json"
        );
        Ok(())
    }
}

fn csv_escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
