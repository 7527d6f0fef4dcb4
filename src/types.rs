//! Shared value types for the fill pipeline

use crate::error::{SheetfillError, SheetfillResult};
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Scalar written into a single cell.
///
/// The JSON type decides the cell type: numbers stay numbers even when a
/// string would look numeric, and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Convert a JSON value, rejecting anything that is not a scalar
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(CellValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(CellValue::Number),
            Value::String(s) => Some(CellValue::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// Address string → value assignments, as produced by the mapping step or
/// supplied directly by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AddressValueMap {
    entries: BTreeMap<String, CellValue>,
}

impl AddressValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: impl Into<String>, value: impl Into<CellValue>) {
        self.entries.insert(address.into(), value.into());
    }

    pub fn get(&self, address: &str) -> Option<&CellValue> {
        self.entries.get(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CellValue)> {
        self.entries.iter()
    }

    /// Build from a parsed JSON document.
    ///
    /// The top level must be an object and every value a string, number or
    /// boolean. The error names the first offending key.
    pub fn from_json_value(value: Value) -> Result<Self, String> {
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                ))
            }
        };

        let mut map = Self::new();
        for (key, value) in object {
            match CellValue::from_json(&value) {
                Some(cell) => map.insert(key, cell),
                None => {
                    return Err(format!(
                        "value for '{}' must be a string, number or boolean, got {}",
                        key,
                        json_kind(&value)
                    ))
                }
            }
        }
        Ok(map)
    }

    /// Parse caller-supplied JSON text (the `data_json` form field, the
    /// CLI `--data` argument)
    pub fn parse_json(raw: &str) -> SheetfillResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| SheetfillError::MalformedJson(e.to_string()))?;
        Self::from_json_value(value).map_err(SheetfillError::MalformedJson)
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for AddressValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Where a pipeline input comes from.
///
/// Uploaded bytes are persisted as a request-owned temporary artifact;
/// existing paths belong to the caller and are never released.
#[derive(Debug, Clone)]
pub enum DocumentInput {
    Uploaded {
        file_name: Option<String>,
        bytes: Bytes,
    },
    ExistingPath(PathBuf),
}

impl DocumentInput {
    /// Name used for extension checks and display
    pub fn display_name(&self) -> Option<String> {
        match self {
            DocumentInput::Uploaded { file_name, .. } => file_name.clone(),
            DocumentInput::ExistingPath(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }

    /// Lowercased extension including the dot, e.g. ".xlsx"
    pub fn extension(&self) -> Option<String> {
        let name = self.display_name()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_text() {
        let map = AddressValueMap::parse_json(r#"{"F4": "205274-101"}"#).unwrap();
        assert_eq!(map.get("F4"), Some(&CellValue::Text("205274-101".to_string())));

        assert!(matches!(
            AddressValueMap::parse_json("{not json"),
            Err(SheetfillError::MalformedJson(_))
        ));
        match AddressValueMap::parse_json("[1, 2]") {
            Err(SheetfillError::MalformedJson(msg)) => assert!(msg.contains("array"), "{msg}"),
            other => panic!("expected MalformedJson, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_value_flat_object() {
        let map = AddressValueMap::from_json_value(json!({
            "D4": "205274-101.01.01",
            "D20": 58.427,
            "BU6": true
        }))
        .unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(
            map.get("D4"),
            Some(&CellValue::Text("205274-101.01.01".to_string()))
        );
        assert_eq!(map.get("D20"), Some(&CellValue::Number(58.427)));
        assert_eq!(map.get("BU6"), Some(&CellValue::Bool(true)));
    }

    #[test]
    fn test_numeric_looking_string_stays_text() {
        let map = AddressValueMap::from_json_value(json!({"A1": "58.427"})).unwrap();
        assert_eq!(map.get("A1"), Some(&CellValue::Text("58.427".to_string())));
    }

    #[test]
    fn test_from_json_value_rejects_non_object() {
        let err = AddressValueMap::from_json_value(json!(["A1", 1])).unwrap_err();
        assert!(err.contains("array"));
    }

    #[test]
    fn test_from_json_value_rejects_nested() {
        let err = AddressValueMap::from_json_value(json!({"A1": {"v": 1}})).unwrap_err();
        assert!(err.contains("'A1'"));
        assert!(err.contains("object"));

        let err = AddressValueMap::from_json_value(json!({"A1": null})).unwrap_err();
        assert!(err.contains("null"));
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Number(58.0).to_string(), "58");
        assert_eq!(CellValue::Number(58.427).to_string(), "58.427");
        assert_eq!(CellValue::Bool(true).to_string(), "true");
        assert_eq!(CellValue::from("x").to_string(), "x");
    }

    #[test]
    fn test_document_input_extension() {
        let upload = DocumentInput::Uploaded {
            file_name: Some("Template.XLSX".to_string()),
            bytes: Bytes::new(),
        };
        assert_eq!(upload.extension(), Some(".xlsx".to_string()));

        let path = DocumentInput::ExistingPath(PathBuf::from("/tmp/scan.pdf"));
        assert_eq!(path.extension(), Some(".pdf".to_string()));
        assert_eq!(path.display_name(), Some("scan.pdf".to_string()));

        let nameless = DocumentInput::Uploaded {
            file_name: None,
            bytes: Bytes::new(),
        };
        assert_eq!(nameless.extension(), None);
    }
}
