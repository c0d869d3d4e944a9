//! The document half of a bulk action.

use serde::Serialize;

use crate::error::Result;
use crate::ser::to_json_string;

/// Written in place of a missing payload.
pub(crate) const EMPTY_PAYLOAD: &str = "{}";

/// A document to be written by a bulk action.
///
/// `Value` goes through the canonical JSON serializer. The raw variants are assumed to already
/// hold a JSON document and are passed through untouched; nothing checks that they are valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload<T> {
    /// Any serializable value.
    Value(T),
    /// Pre-serialized JSON, as bytes.
    RawBytes(Vec<u8>),
    /// Pre-serialized JSON, as a string.
    RawString(String),
}

impl<T: Serialize> Payload<T> {
    /// Render the payload as its line of the bulk body. Only `Value` can fail.
    ///
    /// Raw bytes that aren't UTF-8 are lossily converted, as the line must be text.
    pub(crate) fn to_line(&self, max_depth: usize) -> Result<String> {
        match self {
            Payload::Value(v) => to_json_string(v, max_depth),
            Payload::RawBytes(raw) => Ok(String::from_utf8_lossy(raw).into_owned()),
            Payload::RawString(raw) => Ok(raw.clone()),
        }
    }
}

impl<T> From<String> for Payload<T> {
    fn from(raw: String) -> Self {
        Payload::RawString(raw)
    }
}

impl<T> From<&str> for Payload<T> {
    fn from(raw: &str) -> Self {
        Payload::RawString(raw.to_string())
    }
}

impl<T> From<Vec<u8>> for Payload<T> {
    fn from(raw: Vec<u8>) -> Self {
        Payload::RawBytes(raw)
    }
}
