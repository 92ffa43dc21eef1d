#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # oaitab
//!
//! A library and CLI for harvesting bibliographic metadata from OAI-PMH
//! repositories and flattening it into analysis-ready tables.
//!
//! The pipeline has two halves:
//!
//! 1. **Harvest** — [`harvester::Harvester`] drives the paginated
//!    `ListRecords` protocol over an [`transport::OaiTransport`], streaming
//!    every batch straight to an XML cache file on disk. At most one batch
//!    is in memory at a time, and an interrupted harvest still produces a
//!    well-formed (if incomplete) document.
//! 2. **Convert** — [`convert::oai_to_table`] detects the embedded record
//!    format (MARC21XML or EDM), streams the records back out of the cache
//!    file, flattens each one into a field-path map in parallel, and builds
//!    a column-oriented [`table::Table`] ready for CSV/TSV export.
//!
//! ## Quick Start
//!
//! ```no_run
//! use oaitab::{CollectionRegistry, ConvertOptions, Harvester, HttpTransport};
//!
//! # fn main() -> oaitab::Result<()> {
//! let registry = CollectionRegistry::builtin();
//! let collection = registry.require("erb_books")?;
//!
//! // Harvest the whole collection into a local XML cache.
//! let transport = HttpTransport::for_collection_url(&collection.endpoint_url)?;
//! let mut cache = std::fs::File::create("erb_books.xml")?;
//! Harvester::new(transport).harvest(&collection.endpoint_url, &mut cache)?;
//!
//! // Flatten it into a table and write CSV.
//! let table = oaitab::oai_to_table("erb_books.xml", &ConvertOptions::default(), None)?;
//! table.write_csv(std::fs::File::create("erb_books.csv")?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`cursor`] — resumption token decode/encode/step
//! - [`transport`] — one `ListRecords` round-trip over HTTP, envelope splitting
//! - [`harvester`] — the streaming harvest coordinator
//! - [`detect`] — MARC21XML vs EDM format sniffing
//! - [`record`] — MARC record structures (`Record`, `Field`, `Subfield`)
//! - [`marcxml`] — MARCXML deserialization
//! - [`field_paths`] — MARC record flattening into field-path maps
//! - [`edm`] — Dublin Core extraction from EDM records
//! - [`reader`] — streaming record extraction from harvested files
//! - [`parallel`] — rayon-based parallel record parsing
//! - [`table`] — the tabularizer and CSV/TSV output
//! - [`convert`] — high-level file-to-table / file-to-JSON drivers
//! - [`config`] — collection registry and column-name dictionary
//! - [`error`] — error types and result type

pub mod config;
pub mod convert;
pub mod cursor;
pub mod detect;
pub mod edm;
pub mod error;
pub mod field_paths;
pub mod harvester;
pub mod marcxml;
pub mod ns;
pub mod parallel;
pub mod reader;
pub mod record;
pub mod table;
pub mod transport;

pub use config::{CollectionDescriptor, CollectionRegistry, ColumnNames};
pub use convert::{oai_to_json, oai_to_table, ConvertOptions};
pub use cursor::ResumptionCursor;
pub use detect::{detect_format, detect_format_in_file, RecordFormat};
pub use error::{OaiError, Result};
pub use field_paths::{FieldMap, ParseOptions};
pub use harvester::Harvester;
pub use reader::OaiRecordReader;
pub use record::{Field, Record, Subfield};
pub use table::Table;
pub use transport::{split_envelope, HttpTransport, OaiResponse, OaiTransport};
