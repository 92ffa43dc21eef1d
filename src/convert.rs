//! High-level conversion drivers: harvested file -> table / JSON.
//!
//! These functions tie the pipeline together: detect the record format,
//! stream the raw record snapshots out of the harvested file, parse them in
//! parallel, and hand the field maps to the tabularizer. The sparsity
//! threshold only applies to MARC input — EDM records produce a small, dense
//! column set and are kept whole.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use indexmap::IndexMap;
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ColumnNames;
use crate::detect::{detect_format_in_file, RecordFormat};
use crate::edm;
use crate::error::Result;
use crate::field_paths::ParseOptions;
use crate::marcxml;
use crate::parallel::parse_records_parallel;
use crate::reader::OaiRecordReader;
use crate::table::Table;

/// Options for [`oai_to_table`].
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Sparsity threshold for MARC columns; columns filled in no more than
    /// this fraction of rows are dropped.
    pub min_fill_ratio: f64,
    /// Whether MARC control fields are kept as columns.
    pub keep_control_fields: bool,
    /// Whether to show a progress indicator while reading.
    pub progress: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            min_fill_ratio: 0.1,
            keep_control_fields: true,
            progress: true,
        }
    }
}

/// Read every raw record snapshot from a harvested OAI-PMH file.
fn collect_records<P: AsRef<Path>>(path: P, progress: bool) -> Result<Vec<String>> {
    let file = BufReader::new(File::open(path)?);
    let bar = if progress {
        let bar = ProgressBar::new_spinner();
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut records = Vec::new();
    for item in OaiRecordReader::new(file) {
        records.push(item?);
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(records)
}

/// Convert a harvested OAI-PMH file into a [`Table`].
///
/// Detects the record format, parses all records in parallel, and
/// tabularizes the result. Records that fail structurally become empty rows
/// and are counted in the log rather than aborting the run.
///
/// # Errors
///
/// Fails on IO problems, an undetectable format, or a structurally
/// malformed document.
pub fn oai_to_table<P: AsRef<Path>>(
    path: P,
    options: &ConvertOptions,
    rename: Option<&ColumnNames>,
) -> Result<Table> {
    let format = detect_format_in_file(&path)?;
    info!("detected {format} records, converting");

    let records = collect_records(&path, options.progress)?;
    let parse_options = ParseOptions {
        keep_control_fields: options.keep_control_fields,
    };
    let (maps, failures) = parse_records_parallel(&records, format, &parse_options);
    if failures > 0 {
        warn!("{failures} of {} records failed to parse", records.len());
    }

    // EDM columns are few and dense; the sparsity filter is a MARC concern.
    let min_fill_ratio = match format {
        RecordFormat::Marc => options.min_fill_ratio,
        RecordFormat::Edm => 0.0,
    };
    Ok(Table::build(maps, min_fill_ratio, rename))
}

#[derive(Serialize)]
struct RecordDump {
    records: IndexMap<String, serde_json::Value>,
}

/// Convert a harvested OAI-PMH file into a JSON document.
///
/// The output object holds one entry per record under `"records"`, keyed by
/// the record's position. MARC records are dumped with their full
/// field/subfield structure; EDM records as their flattened field maps.
/// Returns the number of records written.
///
/// # Errors
///
/// As [`oai_to_table`], plus JSON serialization errors.
pub fn oai_to_json<P: AsRef<Path>, W: io::Write>(path: P, writer: W) -> Result<usize> {
    let format = detect_format_in_file(&path)?;
    let records = collect_records(&path, false)?;

    let mut dump = RecordDump {
        records: IndexMap::new(),
    };
    for raw in &records {
        let value = match format {
            RecordFormat::Marc => match marcxml::marcxml_to_record(raw)? {
                Some(record) => serde_json::to_value(&record)?,
                // Deleted-record stubs carry no metadata and are not dumped.
                None => continue,
            },
            RecordFormat::Edm => serde_json::to_value(edm::parse(raw)?)?,
        };
        dump.records.insert(dump.records.len().to_string(), value);
    }

    let written = dump.records.len();
    serde_json::to_writer(writer, &dump)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MARC_FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
    <OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
        <responseDate>2023-04-11T07:42:12Z</responseDate>
        <request verb="ListRecords">https://data.digar.ee/repox/OAIHandler</request>
        <ListRecords>
            <record>
                <header><identifier>oai:erb:1</identifier></header>
                <metadata>
                    <marc:record xmlns:marc="http://www.loc.gov/MARC21/slim">
                        <marc:leader>01234nam a2200289 a 4500</marc:leader>
                        <marc:controlfield tag="001">rec1</marc:controlfield>
                        <marc:datafield tag="245" ind1="1" ind2="0">
                            <marc:subfield code="a">Esimene raamat</marc:subfield>
                        </marc:datafield>
                    </marc:record>
                </metadata>
            </record>
            <record>
                <header><identifier>oai:erb:2</identifier></header>
                <metadata>
                    <marc:record xmlns:marc="http://www.loc.gov/MARC21/slim">
                        <marc:leader>01234nam a2200289 a 4500</marc:leader>
                        <marc:controlfield tag="001">rec2</marc:controlfield>
                        <marc:datafield tag="245" ind1="1" ind2="0">
                            <marc:subfield code="a">Teine raamat</marc:subfield>
                        </marc:datafield>
                    </marc:record>
                </metadata>
            </record>
        </ListRecords>
    </OAI-PMH>"#;

    fn write_fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_marc_file_to_table() {
        let file = write_fixture(MARC_FILE);
        let options = ConvertOptions {
            progress: false,
            ..ConvertOptions::default()
        };
        let table = oai_to_table(file.path(), &options, None).unwrap();

        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.get(0, "001"), Some("rec1"));
        assert_eq!(table.get(0, "245$a"), Some("Esimene raamat"));
        assert_eq!(table.get(1, "245$a"), Some("Teine raamat"));
    }

    #[test]
    fn test_marc_file_to_json() {
        let file = write_fixture(MARC_FILE);
        let mut out = Vec::new();
        let written = oai_to_json(file.path(), &mut out).unwrap();

        assert_eq!(written, 2);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value["records"]["0"]["control_fields"]["001"] == "rec1");
        assert!(value["records"]["1"].is_object());
    }

    #[test]
    fn test_undetectable_format_fails() {
        let file = write_fixture("<feed><entry>nothing bibliographic</entry></feed>");
        let options = ConvertOptions {
            progress: false,
            ..ConvertOptions::default()
        };
        assert!(matches!(
            oai_to_table(file.path(), &options, None),
            Err(crate::OaiError::UnknownFormat)
        ));
    }
}
