//! MARC bibliographic record structures.
//!
//! This module provides the record types the field extraction engine walks:
//! - [`Record`] — one bibliographic record as carried by MARCXML
//! - [`Field`] — variable data fields (010+) with indicators and subfields
//! - [`Subfield`] — named data elements within fields
//!
//! Fields are stored in insertion order using `IndexMap`, preserving the
//! order in which they appear in the source document. The leader is kept as
//! the raw 24-character string from the XML; its byte layout is never
//! interpreted here.
//!
//! # Examples
//!
//! ```
//! use oaitab::record::{Field, Record};
//!
//! let mut record = Record::new();
//! record.add_control_field("001".to_string(), "b10645771".to_string());
//!
//! let mut field = Field::new("245".to_string(), '1', '0');
//! field.add_subfield('a', "Tõde ja õigus".to_string());
//! record.add_field(field);
//!
//! assert_eq!(record.get_control_field("001"), Some("b10645771"));
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A MARC bibliographic record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    /// Raw leader string, when the source document carries one.
    pub leader: Option<String>,
    /// Control fields (001-009) - tag -> value, preserves insertion order.
    pub control_fields: IndexMap<String, String>,
    /// Data fields (010+) - tag -> fields, preserves insertion order.
    pub fields: IndexMap<String, Vec<Field>>,
}

/// A data field in a MARC record (fields 010 and higher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (3 digits).
    pub tag: String,
    /// First indicator.
    pub indicator1: char,
    /// Second indicator.
    pub indicator2: char,
    /// Subfields, in source order.
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// A subfield within a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character).
    pub code: char,
    /// Subfield value.
    pub value: String,
}

impl Record {
    /// Create an empty MARC record.
    #[must_use]
    pub fn new() -> Self {
        Record::default()
    }

    /// Add a control field (001-009).
    pub fn add_control_field(&mut self, tag: String, value: String) {
        self.control_fields.insert(tag, value);
    }

    /// Get a control field value.
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields.get(tag).map(String::as_str)
    }

    /// Add a data field.
    pub fn add_field(&mut self, field: Field) {
        self.fields
            .entry(field.tag.clone())
            .or_default()
            .push(field);
    }

    /// Get all fields with a given tag.
    #[must_use]
    pub fn get_fields(&self, tag: &str) -> Option<&[Field]> {
        self.fields.get(tag).map(Vec::as_slice)
    }

    /// Iterate over all data fields in insertion order.
    pub fn data_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values().flat_map(|v| v.iter())
    }

    /// Iterate over fields matching a specific tag.
    pub fn fields_by_tag(&self, tag: &str) -> impl Iterator<Item = &Field> {
        self.fields.get(tag).map(|v| v.iter()).into_iter().flatten()
    }

    /// Iterate over all control fields as (tag, value) tuples.
    pub fn control_fields_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.control_fields
            .iter()
            .map(|(tag, value)| (tag.as_str(), value.as_str()))
    }

    /// True when the record carries neither a leader nor any field.
    ///
    /// Deleted-record stubs in OAI-PMH responses deserialize to empty
    /// records; callers use this to skip them.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leader.is_none() && self.control_fields.is_empty() && self.fields.is_empty()
    }
}

impl Field {
    /// Create a new data field with the given tag and indicators.
    #[must_use]
    pub fn new(tag: String, indicator1: char, indicator2: char) -> Self {
        Field {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Append a subfield.
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// Get the first subfield value with a given code.
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Iterate over all subfield values with a given code.
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }
}
