//! bulk-index encodes single-document write actions for a document store's bulk endpoint. Each
//! action becomes two lines of newline-delimited JSON:
//!
//! ```text
//! {"create":{"_id":"1","_index":"index101","_type":"employee"}}
//! {"user":"olivere","city":"santafe","age":56}
//! ```
//!
//! The first line names the operation (`index`, `create`, ...) and carries the document's
//! metadata. The second line is the document itself, or `{}` if none was given.
//!
//! Output is byte-exact and stable:
//!
//! - Unset metadata is never written, not even as `null`.
//! - Metadata keys are always written in ascending byte order, as are the keys of any map inside
//!     a serialized document. Struct fields keep their declared order.
//! - A document may be any [`serde::Serialize`] value, or pre-encoded JSON given as bytes or a
//!     string. Pre-encoded JSON is passed through untouched.
//!
//! Joining the lines of many actions into a single request body, and sending it, is left to the
//! caller. The [`BulkableRequest`] trait is the seam for doing so.
//!
//! ```
//! use bulk_index::BulkIndexRequest;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Employee {
//!     user: String,
//!     city: String,
//!     age: u32,
//! }
//!
//! let mut req = BulkIndexRequest::new();
//! req.op_type("create")
//!     .index("index101")
//!     .doc_type("employee")
//!     .id("1")
//!     .doc(Employee { user: "olivere".into(), city: "santafe".into(), age: 56 });
//!
//! assert_eq!(
//!     req.to_string(),
//!     "{\"create\":{\"_id\":\"1\",\"_index\":\"index101\",\"_type\":\"employee\"}}\n\
//!      {\"user\":\"olivere\",\"city\":\"santafe\",\"age\":56}"
//! );
//! ```

mod bulkable;
mod depth_tracking;
mod error;
mod payload;
mod request;
mod ser;

pub use self::bulkable::BulkableRequest;
pub use self::error::{Error, Result};
pub use self::payload::Payload;
pub use self::request::BulkIndexRequest;

/// The default maximum nesting depth of a serialized document. Can be overridden per request with
/// [`BulkIndexRequest::max_depth`].
pub const MAX_DEPTH: usize = 128;

/// Op type that adds or replaces a document. This is the default.
pub const OP_INDEX: &str = "index";
/// Op type that adds a document only if it doesn't already exist.
pub const OP_CREATE: &str = "create";
