//! MARCXML deserialization of MARC records.
//!
//! This module parses standard MARCXML, as defined by the Library of
//! Congress (<https://www.loc.gov/standards/marcxml/>), into [`Record`]
//! values. Both default-namespace (`<record xmlns="...">`) and
//! prefix-namespace (`<marc:record xmlns:marc="...">`) forms are accepted,
//! as is the OAI-PMH record wrapper produced by harvesting
//! (`<record><header/><metadata><record>...`).
//!
//! # Examples
//!
//! ```
//! let xml = r#"<record xmlns="http://www.loc.gov/MARC21/slim">
//!     <leader>01234nam a2200289 a 4500</leader>
//!     <controlfield tag="001">12345</controlfield>
//!     <datafield tag="245" ind1="1" ind2="0">
//!         <subfield code="a">Test title</subfield>
//!     </datafield>
//! </record>"#;
//!
//! let record = oaitab::marcxml::marcxml_to_record(xml).unwrap().unwrap();
//! assert_eq!(record.get_control_field("001"), Some("12345"));
//! ```

use crate::error::{OaiError, Result};
use crate::record::{Field, Record};
use lazy_static::lazy_static;
use quick_xml::de::from_str as xml_from_str;
use regex::Regex;
use serde::Deserialize;

/// MARCXML record representation for deserialization.
#[derive(Debug, Deserialize)]
pub struct MarcxmlRecord {
    /// MARC leader string, absent on some minimal records.
    #[serde(default)]
    pub leader: Option<String>,
    /// Control fields (tags 001-009).
    #[serde(default)]
    pub controlfield: Vec<MarcxmlControlField>,
    /// Data fields (tags 010+).
    #[serde(default)]
    pub datafield: Vec<MarcxmlDataField>,
}

/// MARCXML control field representation.
#[derive(Debug, Deserialize)]
pub struct MarcxmlControlField {
    /// Field tag as an XML attribute (e.g., "001", "008").
    #[serde(rename = "@tag")]
    pub tag: String,
    /// Control field value (text content).
    #[serde(rename = "$value", default)]
    pub value: String,
}

/// MARCXML data field representation.
#[derive(Debug, Deserialize)]
pub struct MarcxmlDataField {
    /// Field tag as an XML attribute (e.g., "245", "650").
    #[serde(rename = "@tag")]
    pub tag: String,
    /// First indicator as an XML attribute.
    #[serde(rename = "@ind1", default)]
    pub ind1: String,
    /// Second indicator as an XML attribute.
    #[serde(rename = "@ind2", default)]
    pub ind2: String,
    /// Subfields.
    #[serde(default)]
    pub subfield: Vec<MarcxmlSubfield>,
}

/// MARCXML subfield representation.
#[derive(Debug, Deserialize)]
pub struct MarcxmlSubfield {
    /// Subfield code as an XML attribute (e.g., "a", "b", "c").
    #[serde(rename = "@code", default)]
    pub code: String,
    /// Subfield value (text content).
    #[serde(rename = "$value", default)]
    pub value: String,
}

/// OAI-PMH `<record>` wrapper around an embedded MARCXML record.
#[derive(Debug, Deserialize)]
struct OaiRecordXml {
    #[serde(default)]
    metadata: Option<OaiMetadataXml>,
}

/// The `<metadata>` element inside an OAI-PMH record wrapper.
#[derive(Debug, Deserialize)]
struct OaiMetadataXml {
    #[serde(default)]
    record: Option<MarcxmlRecord>,
}

lazy_static! {
    /// Strips xmlns declarations (both default and prefixed).
    static ref RE_XMLNS: Regex = Regex::new(r#"\s+xmlns(?::\w+)?="[^"]*""#).unwrap();
    /// Strips namespace prefixes on element names: `<marc:record>` -> `<record>`.
    static ref RE_PREFIX: Regex = Regex::new(r"<(/?)(\w+):").unwrap();
}

/// Strip XML namespace prefixes and declarations from MARCXML input.
///
/// Handles both `marc:record` -> `record` (prefixed namespace) and
/// `xmlns="..."` / `xmlns:marc="..."` (namespace declarations), so the
/// serde deserializer sees plain element names.
fn strip_xml_ns(xml: &str) -> String {
    let stripped = RE_XMLNS.replace_all(xml, "");
    RE_PREFIX.replace_all(&stripped, "<$1").to_string()
}

/// Convert a MARCXML string to a MARC record.
///
/// Accepts a bare MARCXML `<record>` (with or without a namespace) or an
/// OAI-PMH record wrapper whose `<metadata>` element embeds the MARC record.
/// A wrapper without embedded metadata — the shape of a deleted-record stub —
/// returns `Ok(None)`.
///
/// # Errors
///
/// Returns [`OaiError::MalformedXml`] if the XML is structurally invalid.
pub fn marcxml_to_record(xml: &str) -> Result<Option<Record>> {
    let cleaned = strip_xml_ns(xml);

    // An OAI wrapper and a bare MARCXML record share the root element name,
    // so try the wrapper shape first and fall back to the bare record.
    if let Ok(wrapper) = xml_from_str::<OaiRecordXml>(&cleaned) {
        if let Some(inner) = wrapper.metadata.and_then(|m| m.record) {
            return Ok(Some(build_record(inner)));
        }
    }

    let xml_record: MarcxmlRecord = xml_from_str(&cleaned)
        .map_err(|e| OaiError::MalformedXml(format!("failed to parse MARCXML: {e}")))?;
    let record = build_record(xml_record);
    if record.is_empty() {
        // No leader and no fields: a deleted-record stub or an empty wrapper.
        return Ok(None);
    }
    Ok(Some(record))
}

/// Internal helper: convert a deserialized [`MarcxmlRecord`] into a [`Record`].
fn build_record(xml_record: MarcxmlRecord) -> Record {
    let mut record = Record::new();
    record.leader = xml_record.leader;

    for cf in xml_record.controlfield {
        record.add_control_field(cf.tag, cf.value);
    }

    for df in xml_record.datafield {
        let ind1 = df.ind1.chars().next().unwrap_or(' ');
        let ind2 = df.ind2.chars().next().unwrap_or(' ');

        let mut field = Field::new(df.tag, ind1, ind2);
        for sf in df.subfield {
            // A subfield with a missing code is a cataloguing error in the
            // source data; keep the value reachable rather than dropping it.
            let code = sf.code.chars().next().unwrap_or(' ');
            field.add_subfield(code, sf.value);
        }
        record.add_field(field);
    }

    record
}
