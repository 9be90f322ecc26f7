//! Literal values carried on mutation edges, plus the typed converters used
//! when mapping CSV columns onto predicates.

use crate::error::{Error, Result};

/// A typed literal stored on an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 string literal
    Str(String),
    /// 64-bit signed integer literal
    Int(i64),
    /// 64-bit float literal
    Double(f64),
    /// Untyped (store-default) literal, used for preserved raw values
    Default(String),
}

impl Value {
    pub fn str(val: impl Into<String>) -> Self {
        Value::Str(val.into())
    }

    pub fn default_val(val: impl Into<String>) -> Self {
        Value::Default(val.into())
    }
}

/// Declared data type of a mapped CSV column.
///
/// Numeric conversions strip thousands separators before parsing so values
/// exported as `1,234` round-trip as `1234`. A failed conversion is reported
/// to the caller, which records the raw value under a `.failure` predicate
/// rather than dropping the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Int,
    Float,
    Default,
}

impl DataType {
    /// Convert a raw CSV cell into a typed [`Value`].
    pub fn convert(&self, raw: &str) -> Result<Value> {
        match self {
            DataType::String => Ok(Value::Str(raw.to_owned())),
            DataType::Default => Ok(Value::Default(raw.to_owned())),
            DataType::Int => {
                let cleaned = raw.replace(',', "");
                cleaned
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|e| Error::conversion(raw, e.to_string()))
            }
            DataType::Float => {
                let cleaned = raw.replace(',', "");
                cleaned
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|e| Error::conversion(raw, e.to_string()))
            }
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::String => write!(f, "string"),
            DataType::Int => write!(f, "int"),
            DataType::Float => write!(f, "float"),
            DataType::Default => write!(f, "default"),
        }
    }
}
