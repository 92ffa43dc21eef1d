//! Resumption cursor for paginated OAI-PMH harvesting.
//!
//! OAI-PMH servers return a `resumptionToken` with each partial `ListRecords`
//! response. The token observed in the wild is a colon-delimited 5-tuple
//! `session:set:prefix:cursor:size`, sometimes with a trailing separator.
//! The cursor is opaque except for the two numeric fields, which the client
//! reads only to size its progress indicator — pagination itself is always
//! driven by the token the server returns with the *next* response.
//!
//! # Examples
//!
//! ```
//! use oaitab::cursor::ResumptionCursor;
//!
//! let cursor = ResumptionCursor::decode("1744807575133:erb:marc21xml:1000:223968").unwrap();
//! assert_eq!(cursor.cursor_position(), 1000);
//! assert_eq!(cursor.collection_size(), 223968);
//! ```

use crate::error::{OaiError, Result};

/// Decoded form of an OAI-PMH resumption token.
///
/// [`step`](Self::step) exists as a documented fallback for servers that keep
/// a constant batch size; the harvester itself trusts only server-supplied
/// tokens, since local stepping diverges if the server changes its batch size
/// mid-harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionCursor {
    session_id: String,
    set_name: String,
    metadata_prefix: String,
    cursor_position: u64,
    collection_size: u64,
    /// Whether the original token carried a trailing `:` separator.
    /// Preserved so re-encoding mirrors the server's punctuation.
    trailing_separator: bool,
}

impl ResumptionCursor {
    /// Decode a colon-delimited resumption token.
    ///
    /// Expects at least five fields (`session:set:prefix:cursor:size`).
    /// A trailing separator is tolerated and remembered for re-encoding.
    /// Extra interior separators are folded into the metadata prefix field.
    ///
    /// # Errors
    ///
    /// Returns [`OaiError::MalformedCursor`] if fewer than five fields are
    /// present or the cursor/size fields are not integers.
    pub fn decode(token: &str) -> Result<Self> {
        let trimmed = token.trim_end_matches(':');
        let trailing_separator = trimmed.len() != token.len();

        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() < 5 {
            return Err(OaiError::MalformedCursor(format!(
                "expected at least 5 fields, got {} in '{token}'",
                parts.len()
            )));
        }

        let size_field = parts[parts.len() - 1];
        let cursor_field = parts[parts.len() - 2];
        let cursor_position = cursor_field.parse::<u64>().map_err(|_| {
            OaiError::MalformedCursor(format!("cursor field '{cursor_field}' is not a number"))
        })?;
        let collection_size = size_field.parse::<u64>().map_err(|_| {
            OaiError::MalformedCursor(format!("size field '{size_field}' is not a number"))
        })?;

        Ok(ResumptionCursor {
            session_id: parts[0].to_string(),
            set_name: parts[1].to_string(),
            metadata_prefix: parts[2..parts.len() - 2].join(":"),
            cursor_position,
            collection_size,
            trailing_separator,
        })
    }

    /// Re-encode the cursor as a colon-delimited token.
    ///
    /// Round-trips tokens byte-exactly, including the optional trailing
    /// separator observed on some server responses.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut token = format!(
            "{}:{}:{}:{}:{}",
            self.session_id,
            self.set_name,
            self.metadata_prefix,
            self.cursor_position,
            self.collection_size
        );
        if self.trailing_separator {
            token.push(':');
        }
        token
    }

    /// Advance the cursor by `advance_by` records.
    ///
    /// Returns `None` when the new position would reach or exceed the
    /// collection size, i.e. the harvest is complete. This is the fallback
    /// stepping strategy only; prefer the token returned by the server's
    /// next response when one is available.
    #[must_use]
    pub fn step(&self, advance_by: u64) -> Option<Self> {
        let new_position = self.cursor_position + advance_by;
        if new_position >= self.collection_size {
            None
        } else {
            Some(ResumptionCursor {
                cursor_position: new_position,
                ..self.clone()
            })
        }
    }

    /// Current position of the cursor within the collection.
    #[must_use]
    pub fn cursor_position(&self) -> u64 {
        self.cursor_position
    }

    /// Total collection size disclosed by the server.
    #[must_use]
    pub fn collection_size(&self) -> u64 {
        self.collection_size
    }
}
