//! Static configuration: the collection registry and column-name dictionary.
//!
//! Both objects are explicit, immutable values passed into the functions
//! that need them — never ambient global state — so tests can substitute
//! fixtures. The registry ships with the built-in national-library
//! collections and can also be loaded from a JSON file of the same shape:
//!
//! ```json
//! {
//!     "erb_books": {
//!         "title": "ERB - Estonian books",
//!         "endpoint_url": "https://data.digar.ee/repox/OAIHandler?verb=ListRecords&set=raamat&metadataPrefix=marc21xml",
//!         "original_format": "MARC21XML"
//!     }
//! }
//! ```

use std::io;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::detect::RecordFormat;
use crate::error::{OaiError, Result};

/// One harvestable collection: a short key maps to this descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// Human-readable collection title.
    pub title: String,
    /// Full initial `ListRecords` URL for the collection.
    #[serde(alias = "OAI-PMH")]
    pub endpoint_url: String,
    /// Wire format of the embedded records.
    pub original_format: RecordFormat,
}

/// Registry of harvestable collections, keyed by short identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionRegistry {
    collections: IndexMap<String, CollectionDescriptor>,
}

impl CollectionRegistry {
    /// The built-in collections of the national bibliography and the
    /// digital archive.
    #[must_use]
    pub fn builtin() -> Self {
        let mut collections = IndexMap::new();
        let mut add = |key: &str, title: &str, set: &str, prefix: &str, format: RecordFormat| {
            collections.insert(
                key.to_string(),
                CollectionDescriptor {
                    title: title.to_string(),
                    endpoint_url: format!(
                        "https://data.digar.ee/repox/OAIHandler?verb=ListRecords&set={set}&metadataPrefix={prefix}"
                    ),
                    original_format: format,
                },
            );
        };

        add(
            "erb",
            "ERB - Estonian National Bibliography",
            "erb",
            "marc21xml",
            RecordFormat::Marc,
        );
        add(
            "erb_books",
            "ERB - Estonian books",
            "raamat",
            "marc21xml",
            RecordFormat::Marc,
        );
        add(
            "erb_non_estonian",
            "ERB - foreign language books",
            "muukeelne",
            "marc21xml",
            RecordFormat::Marc,
        );
        add(
            "erb_periodicals",
            "ERB - periodicals",
            "perioodika",
            "marc21xml",
            RecordFormat::Marc,
        );
        add(
            "erb_maps",
            "ERB - maps",
            "kaardid",
            "marc21xml",
            RecordFormat::Marc,
        );
        add(
            "nle_digar",
            "DIGAR - digital archive",
            "digar",
            "edm",
            RecordFormat::Edm,
        );
        add(
            "nle_books",
            "DIGAR - books",
            "book",
            "edm",
            RecordFormat::Edm,
        );
        add(
            "nle_journals",
            "DIGAR - journals",
            "journal",
            "edm",
            RecordFormat::Edm,
        );
        add(
            "nle_persons",
            "Person names",
            "person",
            "marc21xml",
            RecordFormat::Marc,
        );
        add(
            "nle_organisations",
            "Organisation names",
            "organization",
            "marc21xml",
            RecordFormat::Marc,
        );

        CollectionRegistry { collections }
    }

    /// Load a registry from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`OaiError::Json`] if the document does not match the
    /// registry shape.
    pub fn from_json_reader<R: io::Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Look up a collection by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CollectionDescriptor> {
        self.collections.get(key)
    }

    /// Look up a collection by key, failing with the list of known keys.
    ///
    /// # Errors
    ///
    /// Returns [`OaiError::UnknownCollection`] for an unregistered key.
    pub fn require(&self, key: &str) -> Result<&CollectionDescriptor> {
        self.get(key).ok_or_else(|| OaiError::UnknownCollection {
            key: key.to_string(),
            available: self
                .collections
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Iterate over (key, descriptor) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CollectionDescriptor)> {
        self.collections
            .iter()
            .map(|(key, descriptor)| (key.as_str(), descriptor))
    }

    /// Number of registered collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// True when no collections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Field-path -> human-readable column name dictionary.
///
/// The dictionary content is curated externally; this type only carries it.
/// Unmapped paths always pass through unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnNames {
    names: IndexMap<String, String>,
}

impl ColumnNames {
    /// An empty dictionary (no renames).
    #[must_use]
    pub fn empty() -> Self {
        ColumnNames::default()
    }

    /// Build a dictionary from (path, name) pairs.
    pub fn from_pairs<'a, I: IntoIterator<Item = (&'a str, &'a str)>>(pairs: I) -> Self {
        ColumnNames {
            names: pairs
                .into_iter()
                .map(|(path, name)| (path.to_string(), name.to_string()))
                .collect(),
        }
    }

    /// Load a dictionary from a JSON object of `"path": "name"` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`OaiError::Json`] if the document is not a string map.
    pub fn from_json_reader<R: io::Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// The display name for a field path, when one is defined.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.names.get(path).map(String::as_str)
    }

    /// Number of defined renames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when no renames are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_lookup() {
        let registry = CollectionRegistry::builtin();
        let books = registry.get("erb_books").unwrap();
        assert_eq!(books.original_format, RecordFormat::Marc);
        assert!(books.endpoint_url.contains("set=raamat"));
        assert_eq!(
            registry.get("nle_digar").unwrap().original_format,
            RecordFormat::Edm
        );
    }

    #[test]
    fn test_unknown_key_lists_available() {
        let registry = CollectionRegistry::builtin();
        let err = registry.require("nonexistent").unwrap_err();
        match err {
            OaiError::UnknownCollection { key, available } => {
                assert_eq!(key, "nonexistent");
                assert!(available.contains("erb_books"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_registry_from_json_accepts_legacy_field_name() {
        let json = r#"{
            "test": {
                "title": "Test collection",
                "OAI-PMH": "https://example.org/oai?verb=ListRecords&set=x&metadataPrefix=marc21xml",
                "original_format": "MARC21XML"
            }
        }"#;
        let registry = CollectionRegistry::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("test").unwrap().original_format,
            RecordFormat::Marc
        );
    }

    #[test]
    fn test_column_names_lookup_and_passthrough() {
        let names = ColumnNames::from_pairs([("245$a", "title"), ("260$c", "publication_date")]);
        assert_eq!(names.get("245$a"), Some("title"));
        assert_eq!(names.get("999$z"), None);
    }

    #[test]
    fn test_column_names_from_json() {
        let names =
            ColumnNames::from_json_reader(r#"{"001": "ID", "020$a": "ISBN"}"#.as_bytes()).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names.get("001"), Some("ID"));
    }
}
