use bytes::Bytes;

use crate::{Dictionary, Error, Result};

/// A decoded bencode value.
///
/// Every value owns its children: there is no sharing between trees.
#[derive(Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    /// A byte string, not necessarily valid UTF-8.
    Bytes(Bytes),
    List(Vec<Value>),
    Dict(Dictionary),
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(arg0) => f.debug_tuple("Integer").field(arg0).finish(),
            Self::Bytes(arg0) => match std::str::from_utf8(arg0) {
                Ok(str) => write!(f, "{:?}", str),
                _ => write!(f, "<{} bytes>", arg0.len()),
            },
            Self::List(arg0) => f.debug_tuple("List").field(arg0).finish(),
            Self::Dict(arg0) => f.debug_tuple("Dict").field(arg0).finish(),
        }
    }
}

impl Value {
    /// Creates a byte string value from a UTF-8 string.
    pub fn string(s: &str) -> Self {
        Value::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Bytes(_) => "byte string",
            Value::List(_) => "list",
            Value::Dict(_) => "dictionary",
        }
    }

    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Value::Integer(v) => Ok(*v),
            _ => Err(Error::message("expected integer")),
        }
    }

    pub fn as_bytes(&self) -> Result<&Bytes> {
        match self {
            Value::Bytes(v) => Ok(v),
            _ => Err(Error::message("expected byte string")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Bytes(v) => match std::str::from_utf8(v) {
                Ok(str) => Ok(str),
                _ => Err(Error::message("byte string contains invalid utf-8")),
            },
            _ => Err(Error::message("expected utf-8 byte string")),
        }
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(v) => Ok(v.as_slice()),
            _ => Err(Error::message("expected list")),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Value::Dict(dict) => Ok(dict),
            _ => Err(Error::message("expected dictionary")),
        }
    }

    /// Encodes the value in canonical form.
    pub fn bencode(&self) -> Vec<u8> {
        crate::encode(self)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Dictionary> for Value {
    fn from(value: Dictionary) -> Self {
        Value::Dict(value)
    }
}

impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Bytes(v) => match std::str::from_utf8(v) {
                Ok(str) => serializer.serialize_str(str),
                Err(_) => serializer.serialize_bytes(v),
            },
            Value::List(v) => serde::Serialize::serialize(v, serializer),
            Value::Dict(v) => serde::Serialize::serialize(v, serializer),
        }
    }
}
