use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref NUMERIC_PREFIX: Regex =
        Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?").unwrap();
}

/// Raw spreadsheet record: header text to cell value, exactly as imported.
pub type RawRecord = Map<String, Value>;

pub const UNKNOWN_UNIT: &str = "N/A";

/// Cell texts that mark a row as common area (compared trimmed and lowercased).
pub const COMMON_AREA_TOKENS: [&str; 5] = ["true", "sim", "1", "s", "verdadeiro"];

const UNIT_KEY: &str = "unidade";
const PREVIOUS_KEY: &str = "leitura_anterior";
const CURRENT_KEY: &str = "leitura_atual";
const COMMON_AREA_KEY: &str = "area_comum";

/// One row of meter data for a billing unit.
///
/// Serialized with the field names the report service expects.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Reading {
    #[serde(rename = "unidade")]
    pub unit: String,
    #[serde(rename = "leitura_anterior")]
    pub previous_reading: f64,
    #[serde(rename = "leitura_atual")]
    pub current_reading: f64,
    #[serde(rename = "isCommonArea")]
    pub is_common_area: bool,
}

/// The two editable numeric columns of a reading.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReadingField {
    PreviousReading,
    CurrentReading,
}

impl ReadingField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "previous" | "prev" | "previousreading" | "leitura_anterior" => {
                Some(ReadingField::PreviousReading)
            }
            "current" | "curr" | "currentreading" | "leitura_atual" => {
                Some(ReadingField::CurrentReading)
            }
            _ => None,
        }
    }
}

impl Reading {
    /// Converts one raw record into a reading. Never fails: missing or garbage
    /// cells fall back to "N/A", 0 and false.
    pub fn from_record(record: &RawRecord) -> Self {
        let mut unit = None;
        let mut previous = None;
        let mut current = None;
        let mut common_area = None;

        // Later columns win when two headers normalize to the same key.
        for (key, value) in record {
            match normalize_header(key).as_str() {
                UNIT_KEY => unit = Some(value),
                PREVIOUS_KEY => previous = Some(value),
                CURRENT_KEY => current = Some(value),
                COMMON_AREA_KEY => common_area = Some(value),
                _ => {}
            }
        }

        Reading {
            unit: coerce_unit(unit),
            previous_reading: previous.map(coerce_number).unwrap_or(0.0),
            current_reading: current.map(coerce_number).unwrap_or(0.0),
            is_common_area: common_area.map(coerce_common_area).unwrap_or(false),
        }
    }

    pub fn consumption(&self) -> f64 {
        self.current_reading - self.previous_reading
    }

    pub fn has_negative_consumption(&self) -> bool {
        self.consumption() < 0.0
    }

    pub fn set(&mut self, field: ReadingField, value: f64) {
        match field {
            ReadingField::PreviousReading => self.previous_reading = value,
            ReadingField::CurrentReading => self.current_reading = value,
        }
    }
}

/// Trims, lowercases and collapses whitespace runs to `_`, so " Leitura  Atual "
/// becomes "leitura_atual".
pub fn normalize_header(header: &str) -> String {
    WHITESPACE_RUN
        .replace_all(&header.trim().to_lowercase(), "_")
        .into_owned()
}

/// Parses the longest numeric prefix of `text`, ignoring leading whitespace.
/// Anything unparseable or non-finite becomes 0.
pub fn parse_number(text: &str) -> f64 {
    NUMERIC_PREFIX
        .find(text.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Renders a cell value the way it would read as text: numbers without a
/// trailing `.0`, booleans as `true`/`false`.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn is_common_area_token(text: &str) -> bool {
    let token = text.trim().to_lowercase();
    COMMON_AREA_TOKENS.contains(&token.as_str())
}

fn coerce_unit(value: Option<&Value>) -> String {
    let text = value.map(value_to_text).unwrap_or_default();
    if text.trim().is_empty() {
        UNKNOWN_UNIT.to_string()
    } else {
        text
    }
}

fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_number(s),
        _ => 0.0,
    }
}

fn coerce_common_area(value: &Value) -> bool {
    is_common_area_token(&value_to_text(value))
}
