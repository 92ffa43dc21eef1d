//! XML namespace URIs used by the OAI-PMH envelope and the embedded
//! record formats.

/// OAI-PMH protocol namespace.
pub const OAI_NS: &str = "http://www.openarchives.org/OAI/2.0/";

/// XML Schema instance namespace, carried on the envelope root.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// MARC21 slim (MARCXML) namespace.
pub const MARC_NS: &str = "http://www.loc.gov/MARC21/slim";

/// Europeana Data Model namespace.
pub const EDM_NS: &str = "http://www.europeana.eu/schemas/edm/";

/// Dublin Core elements namespace.
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// RDF syntax namespace wrapping EDM records.
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Schema location attribute value written on harvested documents.
pub const OAI_SCHEMA_LOCATION: &str =
    "http://www.openarchives.org/OAI/2.0/ http://www.openarchives.org/OAI/2.0/OAI-PMH.xsd";
