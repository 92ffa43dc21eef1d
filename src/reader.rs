//! Streaming extraction of records from harvested OAI-PMH files.
//!
//! This module provides [`OaiRecordReader`], an iterator over the raw
//! `<record>` elements of an OAI-PMH document. The file is never loaded
//! into a DOM: XML events are streamed and each record subtree is
//! re-serialized into its own string snapshot, so a multi-gigabyte harvest
//! converts with one record resident per step.
//!
//! The OAI record wrapper itself contains a nested `record` element when the
//! payload is MARC21XML; nesting is handled by depth counting, so the yielded
//! snippet is always the outermost (OAI-level) record.
//!
//! # Examples
//!
//! ```
//! use oaitab::reader::OaiRecordReader;
//!
//! let xml = r#"<OAI-PMH><ListRecords>
//!     <record><metadata><title>A</title></metadata></record>
//!     <record><metadata><title>B</title></metadata></record>
//! </ListRecords></OAI-PMH>"#;
//!
//! let records: Vec<String> = OaiRecordReader::new(xml.as_bytes())
//!     .collect::<oaitab::Result<_>>()
//!     .unwrap();
//! assert_eq!(records.len(), 2);
//! ```

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::{OaiError, Result};

/// Iterator over the raw `<record>` elements of an OAI-PMH document.
///
/// Yields each record as a self-contained XML string, in document order.
/// A structural XML error ends iteration with an `Err` item.
pub struct OaiRecordReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    records_read: usize,
    done: bool,
}

impl<R: BufRead> std::fmt::Debug for OaiRecordReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OaiRecordReader")
            .field("records_read", &self.records_read)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> OaiRecordReader<R> {
    /// Create a reader over an XML source.
    pub fn new(source: R) -> Self {
        OaiRecordReader {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            records_read: 0,
            done: false,
        }
    }

    /// Number of records yielded so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Advance to the next `<record>` start tag and capture its subtree.
    fn read_record(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Err(e) => {
                    return Err(OaiError::MalformedXml(format!(
                        "failed to read record stream: {e}"
                    )))
                }
                Ok(Event::Eof) => return Ok(None),
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"record" => {
                    // Detach the start tag from the read buffer before the
                    // subtree capture reuses it.
                    let start = Event::Start(e).into_owned();
                    let record = capture_element(&mut self.reader, start)?;
                    self.records_read += 1;
                    return Ok(Some(record));
                }
                Ok(_) => {}
            }
        }
    }
}

/// Re-serialize one element subtree, starting from its already-read start
/// event, into a self-contained XML string.
///
/// Depth counts every element, so a nested element with the same name (the
/// MARC payload's `record` inside the OAI wrapper) does not terminate the
/// capture early.
pub(crate) fn capture_element<R: BufRead>(
    reader: &mut Reader<R>,
    start: Event<'static>,
) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(start).map_err(write_err)?;

    let mut buf = Vec::new();
    let mut depth = 1usize;
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Err(e) => {
                return Err(OaiError::MalformedXml(format!(
                    "failed to read element subtree: {e}"
                )))
            }
            Ok(Event::Eof) => {
                return Err(OaiError::MalformedXml(
                    "unexpected end of document inside an element".to_string(),
                ))
            }
            Ok(event @ Event::Start(_)) => {
                depth += 1;
                writer.write_event(event).map_err(write_err)?;
            }
            Ok(event @ Event::End(_)) => {
                depth -= 1;
                writer.write_event(event).map_err(write_err)?;
                if depth == 0 {
                    break;
                }
            }
            Ok(event) => {
                writer.write_event(event).map_err(write_err)?;
            }
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| OaiError::MalformedXml(format!("element is not valid UTF-8: {e}")))
}

/// Read the text content of the element whose start event was just consumed,
/// discarding markup, up to the matching end tag.
pub(crate) fn element_text<R: BufRead>(reader: &mut Reader<R>) -> Result<String> {
    let mut buf = Vec::new();
    let mut depth = 1usize;
    let mut text = String::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Err(e) => {
                return Err(OaiError::MalformedXml(format!(
                    "failed to read element text: {e}"
                )))
            }
            Ok(Event::Eof) => {
                return Err(OaiError::MalformedXml(
                    "unexpected end of document inside an element".to_string(),
                ))
            }
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Ok(Event::Text(t)) => {
                let value = t
                    .unescape()
                    .map_err(|e| OaiError::MalformedXml(format!("bad text content: {e}")))?;
                text.push_str(&value);
            }
            Ok(_) => {}
        }
    }
    Ok(text)
}

fn write_err(e: quick_xml::Error) -> OaiError {
    OaiError::MalformedXml(format!("failed to re-serialize element: {e}"))
}

impl<R: BufRead> Iterator for OaiRecordReader<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
