use std::fmt;

use serde::ser;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure to encode a bulk request.
///
/// Only the structured payload path can produce one of these. Raw payloads and the action line
/// never fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Occurs when the payload's `Serialize` implementation reports an error, or when it produces
    /// a map key that can't be turned into a JSON object key.
    SerdeFail(String),
    /// Occurs when the payload contains a value JSON can't represent, like a NaN or infinite
    /// float.
    UnsupportedValue(String),
    /// Payload nesting went past the allowed depth.
    ParseLimit(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::SerdeFail(ref msg) => f.write_str(msg),
            Error::UnsupportedValue(ref err) => write!(f, "Unsupported value: {}", err),
            Error::ParseLimit(ref err) => write!(f, "Hit encoding limit: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerdeFail(e.to_string())
    }
}
