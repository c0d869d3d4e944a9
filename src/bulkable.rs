use std::fmt;

use crate::error::Result;

/// A single action that can be placed in a bulk request body.
///
/// The body is built by concatenating the lines of each action, each line followed by a newline.
/// The `Display` form joins the lines with newlines and is meant for logging.
pub trait BulkableRequest: fmt::Display {
    /// Get the on-wire lines of this action: the action-and-metadata line, followed by any
    /// document lines.
    fn source(&mut self) -> Result<&[String]>;
}
