//! Single-document index and create actions for a bulk request.
//!
//! A [`BulkIndexRequest`] is configured through chained setters and then encoded with
//! [`BulkIndexRequest::source`] into two lines: the action-and-metadata line, and the document
//! line. The first line's metadata keys are always written in ascending byte order, so the same
//! request produces byte-identical output every time.
//!
//! ```
//! # use bulk_index::BulkIndexRequest;
//! let mut req: BulkIndexRequest = BulkIndexRequest::new();
//! req.op_type("create").index("index101").doc_type("employee").id("1")
//!     .doc(serde_json::json!({ "user": "olivere" }));
//! let lines = req.source().unwrap();
//! assert_eq!(lines[0], r#"{"create":{"_id":"1","_index":"index101","_type":"employee"}}"#);
//! assert_eq!(lines[1], r#"{"user":"olivere"}"#);
//! ```

use std::fmt;

use educe::Educe;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, trace};

use crate::bulkable::BulkableRequest;
use crate::error::Result;
use crate::payload::{Payload, EMPTY_PAYLOAD};
use crate::ser::to_json_string;
use crate::{MAX_DEPTH, OP_INDEX};

/// A request to index (or create) one document as part of a bulk request.
///
/// Setters store their value as-is and clear any previously encoded lines, so the output of
/// [`source`][Self::source] always reflects the current settings. No setter validates its input;
/// an unknown op type or malformed raw document is left for the server to reject.
///
/// Not meant to be shared between threads while it is being built.
#[derive(Educe, Clone, Debug)]
#[educe(PartialEq)]
pub struct BulkIndexRequest<T = serde_json::Value> {
    op_type: String,
    index: Option<String>,
    doc_type: Option<String>,
    id: Option<String>,
    routing: Option<String>,
    parent: Option<String>,
    version: Option<i64>,
    version_type: Option<String>,
    retry_on_conflict: Option<i64>,
    ttl: Option<String>,
    pipeline: Option<String>,
    payload: Option<Payload<T>>,
    max_depth: usize,
    #[educe(PartialEq(ignore))]
    cached: Option<[String; 2]>,
}

impl<T> Default for BulkIndexRequest<T> {
    fn default() -> Self {
        Self {
            op_type: OP_INDEX.to_string(),
            index: None,
            doc_type: None,
            id: None,
            routing: None,
            parent: None,
            version: None,
            version_type: None,
            retry_on_conflict: None,
            ttl: None,
            pipeline: None,
            payload: None,
            max_depth: MAX_DEPTH,
            cached: None,
        }
    }
}

impl<T> BulkIndexRequest<T> {
    /// Start a new request. The op type is "index" by default.
    pub fn new() -> Self {
        Self::default()
    }

    fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Set whether this request should follow create-only ("create") or upsert ("index")
    /// behavior. Other op types are accepted and passed on unchecked. An empty string restores the
    /// default of "index".
    pub fn op_type(&mut self, op_type: impl Into<String>) -> &mut Self {
        let op_type = op_type.into();
        self.op_type = if op_type.is_empty() {
            OP_INDEX.to_string()
        } else {
            op_type
        };
        self.invalidate();
        self
    }

    /// Set the index to write to. If unset, the index given to the bulk endpoint is used.
    pub fn index(&mut self, index: impl Into<String>) -> &mut Self {
        self.index = Some(index.into());
        self.invalidate();
        self
    }

    /// Set the mapping type of the document. If unset, the type given to the bulk endpoint is used.
    pub fn doc_type(&mut self, doc_type: impl Into<String>) -> &mut Self {
        self.doc_type = Some(doc_type.into());
        self.invalidate();
        self
    }

    /// Set the identifier of the document.
    pub fn id(&mut self, id: impl Into<String>) -> &mut Self {
        self.id = Some(id.into());
        self.invalidate();
        self
    }

    /// Set the routing value, used to pick the shard the document lands on.
    pub fn routing(&mut self, routing: impl Into<String>) -> &mut Self {
        self.routing = Some(routing.into());
        self.invalidate();
        self
    }

    /// Set the identifier of the parent document.
    pub fn parent(&mut self, parent: impl Into<String>) -> &mut Self {
        self.parent = Some(parent.into());
        self.invalidate();
        self
    }

    /// Set the expected version of the document, for optimistic concurrency control.
    ///
    /// Only positive versions are sent. Zero or a negative number is treated the same as never
    /// setting a version.
    pub fn version(&mut self, version: i64) -> &mut Self {
        self.version = Some(version);
        self.invalidate();
        self
    }

    /// Set how versions are checked and generated, e.g. "internal", "external", "external_gte",
    /// or "force".
    pub fn version_type(&mut self, version_type: impl Into<String>) -> &mut Self {
        self.version_type = Some(version_type.into());
        self.invalidate();
        self
    }

    /// Set how many times to retry on a version conflict. Unlike the version, zero is sent as-is.
    pub fn retry_on_conflict(&mut self, retry_on_conflict: i64) -> &mut Self {
        self.retry_on_conflict = Some(retry_on_conflict);
        self.invalidate();
        self
    }

    /// Set an expiration time for the document, like "1m".
    pub fn ttl(&mut self, ttl: impl Into<String>) -> &mut Self {
        self.ttl = Some(ttl.into());
        self.invalidate();
        self
    }

    /// Set the ingest pipeline to run the document through.
    pub fn pipeline(&mut self, pipeline: impl Into<String>) -> &mut Self {
        self.pipeline = Some(pipeline.into());
        self.invalidate();
        self
    }

    /// Set the document to write.
    pub fn doc(&mut self, doc: T) -> &mut Self {
        self.payload(Payload::Value(doc))
    }

    /// Set the document to write as already-encoded JSON bytes. They are sent unmodified.
    pub fn doc_bytes(&mut self, doc: impl Into<Vec<u8>>) -> &mut Self {
        self.payload(Payload::RawBytes(doc.into()))
    }

    /// Set the document to write as an already-encoded JSON string. It is sent unmodified.
    pub fn doc_str(&mut self, doc: impl Into<String>) -> &mut Self {
        self.payload(Payload::RawString(doc.into()))
    }

    /// Set the document to write in any of its [`Payload`] forms.
    pub fn payload(&mut self, payload: Payload<T>) -> &mut Self {
        self.payload = Some(payload);
        self.invalidate();
        self
    }

    /// Remove the document. An empty object is sent in its place.
    pub fn clear_doc(&mut self) -> &mut Self {
        self.payload = None;
        self.invalidate();
        self
    }

    /// Override the maximum nesting depth allowed when serializing the document. Defaults to
    /// [`MAX_DEPTH`].
    pub fn max_depth(&mut self, max_depth: usize) -> &mut Self {
        self.max_depth = max_depth;
        self.invalidate();
        self
    }

    /// Check if the encoded lines are currently cached.
    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    fn action(&self) -> Action<'_> {
        let mut meta = Vec::with_capacity(10);
        let strings = [
            ("_index", &self.index),
            ("_type", &self.doc_type),
            ("_id", &self.id),
            ("_routing", &self.routing),
            ("_parent", &self.parent),
            ("_version_type", &self.version_type),
            ("_ttl", &self.ttl),
            ("pipeline", &self.pipeline),
        ];
        for (key, val) in strings {
            if let Some(val) = val.as_deref().filter(|v| !v.is_empty()) {
                meta.push((key, MetaValue::Str(val)));
            }
        }
        if let Some(version) = self.version.filter(|v| *v > 0) {
            meta.push(("_version", MetaValue::Int(version)));
        }
        if let Some(retry) = self.retry_on_conflict {
            meta.push(("_retry_on_conflict", MetaValue::Int(retry)));
        }
        Action {
            op_type: &self.op_type,
            meta,
        }
    }
}

impl<T: Serialize> BulkIndexRequest<T> {
    /// Get the on-wire representation of the request: the action-and-metadata line, then the
    /// document line.
    ///
    /// The result is cached until the next setter call. Only serializing a [`Payload::Value`]
    /// document can fail.
    pub fn source(&mut self) -> Result<&[String; 2]> {
        let lines = match self.cached.take() {
            Some(lines) => {
                trace!("Reusing cached bulk index lines");
                lines
            }
            None => self.encode()?,
        };
        Ok(self.cached.insert(lines))
    }

    fn encode(&self) -> Result<[String; 2]> {
        // Only ever two levels deep, so the document's depth limit doesn't apply
        let action = to_json_string(&self.action(), MAX_DEPTH)?;
        let doc = match self.payload {
            None => EMPTY_PAYLOAD.to_string(),
            Some(ref payload) => payload.to_line(self.max_depth).map_err(|e| {
                debug!(error = %e, op_type = %self.op_type, "Failed to serialize bulk document");
                e
            })?,
        };
        trace!(op_type = %self.op_type, doc_len = doc.len(), "Encoded bulk index request");
        Ok([action, doc])
    }
}

impl<T: Serialize> fmt::Display for BulkIndexRequest<T> {
    /// Writes both lines separated by a newline, or an "error: ..." placeholder if the document
    /// can't be encoded.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let encoded;
        let lines = match self.cached {
            Some(ref lines) => lines,
            None => match self.encode() {
                Ok(lines) => {
                    encoded = lines;
                    &encoded
                }
                Err(e) => return write!(f, "error: {}", e),
            },
        };
        write!(f, "{}\n{}", lines[0], lines[1])
    }
}

impl<T: Serialize> BulkableRequest for BulkIndexRequest<T> {
    fn source(&mut self) -> Result<&[String]> {
        BulkIndexRequest::source(self).map(|lines| &lines[..])
    }
}

/// The action line: an object with the op type as its only key.
struct Action<'a> {
    op_type: &'a str,
    meta: Vec<(&'static str, MetaValue<'a>)>,
}

enum MetaValue<'a> {
    Str(&'a str),
    Int(i64),
}

impl Serialize for Action<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.op_type, &Meta(&self.meta))?;
        map.end()
    }
}

struct Meta<'a, 'b>(&'b [(&'static str, MetaValue<'a>)]);

impl Serialize for Meta<'_, '_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (*k, v)))
    }
}

impl Serialize for MetaValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match *self {
            MetaValue::Str(s) => serializer.serialize_str(s),
            MetaValue::Int(i) => serializer.serialize_i64(i),
        }
    }
}
