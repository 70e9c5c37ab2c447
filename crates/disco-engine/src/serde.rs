use std::collections::BTreeMap;
use std::iter::FromIterator;

use disco_core::errors::{DiscError, ErrorInfo};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

fn serde_error(code: &str, err: impl ToString) -> DiscError {
    DiscError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => {
            let canonical_values = values.into_iter().map(canonicalize).collect();
            Value::Array(canonical_values)
        }
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic key ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, DiscError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json_serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical).map_err(|err| serde_error("json_write", err))?;
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, DiscError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json_deserialize", err))
}

/// Deserializes a YAML payload into the requested type.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, DiscError> {
    serde_yaml::from_slice(data).map_err(|err| serde_error("yaml_deserialize", err))
}

/// Serde adapter for edge tables that keeps infinities and unset cells.
///
/// JSON has no encoding for `inf` or `NaN`, so infinite edges are written as
/// the strings `"-inf"`/`"+inf"` and unset (`NaN`) cells as `null`.
pub mod edge_table {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Finite(f64),
        Infinite(String),
    }

    fn to_cell(value: f64) -> Option<Cell> {
        if value.is_nan() {
            None
        } else if value == f64::INFINITY {
            Some(Cell::Infinite("+inf".to_string()))
        } else if value == f64::NEG_INFINITY {
            Some(Cell::Infinite("-inf".to_string()))
        } else {
            Some(Cell::Finite(value))
        }
    }

    /// Serializes rows of edges.
    pub fn serialize<S: Serializer>(rows: &[Vec<f64>], serializer: S) -> Result<S::Ok, S::Error> {
        let cells: Vec<Vec<Option<Cell>>> = rows
            .iter()
            .map(|row| row.iter().copied().map(to_cell).collect())
            .collect();
        cells.serialize(serializer)
    }

    /// Deserializes rows of edges.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<f64>>, D::Error> {
        let cells: Vec<Vec<Option<Cell>>> = Vec::deserialize(deserializer)?;
        cells
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        None => Ok(f64::NAN),
                        Some(Cell::Finite(value)) => Ok(value),
                        Some(Cell::Infinite(label)) => match label.as_str() {
                            "+inf" | "inf" => Ok(f64::INFINITY),
                            "-inf" => Ok(f64::NEG_INFINITY),
                            other => Err(D::Error::custom(format!("unknown edge label `{other}`"))),
                        },
                    })
                    .collect::<Result<Vec<f64>, D::Error>>()
            })
            .collect()
    }
}
