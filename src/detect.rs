//! Record format detection for harvested files.
//!
//! A harvested OAI-PMH document embeds either MARC21XML records or EDM
//! (`rdf:RDF/edm:ProvidedCHO`) records. [`detect_format`] streams XML events
//! and classifies the document by the first record-bearing element it sees:
//! a `record` element in the MARC21/slim namespace means [`RecordFormat::Marc`],
//! a `ProvidedCHO` element in the EDM namespace means [`RecordFormat::Edm`].
//! The scan is bounded so a huge file of unrecognized content fails fast.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use serde::{Deserialize, Serialize};

use crate::error::{OaiError, Result};
use crate::ns::{EDM_NS, MARC_NS};

/// Elements scanned before giving up on classification.
pub const DETECT_ELEMENT_BUDGET: usize = 10_000;

/// Wire format of the records embedded in an OAI-PMH document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordFormat {
    /// MARC21XML (`http://www.loc.gov/MARC21/slim`).
    #[serde(rename = "MARC21XML")]
    Marc,
    /// Europeana Data Model (`http://www.europeana.eu/schemas/edm/`).
    #[serde(rename = "EDM", alias = "Europeana Data Model")]
    Edm,
}

impl std::fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordFormat::Marc => write!(f, "MARC21XML"),
            RecordFormat::Edm => write!(f, "EDM"),
        }
    }
}

/// Detect the record format of an XML document.
///
/// Scans at most [`DETECT_ELEMENT_BUDGET`] elements from the reader.
///
/// # Errors
///
/// Returns [`OaiError::UnknownFormat`] if neither namespace is seen within
/// the scanned prefix, or [`OaiError::MalformedXml`] on structural errors.
pub fn detect_format<R: BufRead>(source: R) -> Result<RecordFormat> {
    let mut reader = NsReader::from_reader(source);
    let mut buf = Vec::new();
    let mut seen = 0usize;

    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Err(e) => {
                return Err(OaiError::MalformedXml(format!(
                    "failed to scan document: {e}"
                )))
            }
            Ok((_, Event::Eof)) => break,
            Ok((resolve, Event::Start(e) | Event::Empty(e))) => {
                if let ResolveResult::Bound(Namespace(ns)) = resolve {
                    let local = e.local_name();
                    if ns == MARC_NS.as_bytes() && local.as_ref() == b"record" {
                        return Ok(RecordFormat::Marc);
                    }
                    if ns == EDM_NS.as_bytes() && local.as_ref() == b"ProvidedCHO" {
                        return Ok(RecordFormat::Edm);
                    }
                }
                seen += 1;
                if seen >= DETECT_ELEMENT_BUDGET {
                    break;
                }
            }
            Ok(_) => {}
        }
        buf.clear();
    }

    Err(OaiError::UnknownFormat)
}

/// Detect the record format of a file on disk.
///
/// # Errors
///
/// Returns [`OaiError::Io`] if the file cannot be opened, otherwise as
/// [`detect_format`].
pub fn detect_format_in_file<P: AsRef<Path>>(path: P) -> Result<RecordFormat> {
    let file = File::open(path)?;
    detect_format(BufReader::new(file))
}
