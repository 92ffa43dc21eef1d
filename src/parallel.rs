//! Parallel record parsing using Rayon.
//!
//! Per-record parsing is independent, so the record snapshots collected by
//! the stream reader are mapped over Rayon's work-stealing thread pool. The
//! output order always matches the input order (the map is index-stable), so
//! consumers that need stable diffs get them for free.
//!
//! Failure handling is fail-soft per record: a snapshot that fails
//! structurally yields an empty field map and a warning, never aborting the
//! batch. The number of failed records is returned alongside the maps.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::warn;

use crate::detect::RecordFormat;
use crate::edm;
use crate::error::Result;
use crate::field_paths::{self, FieldMap, ParseOptions};
use crate::marcxml;

/// Parse one raw record snapshot into a [`FieldMap`].
///
/// A MARC record that turns out to be a deleted-record stub parses to an
/// empty map rather than an error.
///
/// # Errors
///
/// Returns an error only for structural XML problems.
pub fn parse_record(raw: &str, format: RecordFormat, options: &ParseOptions) -> Result<FieldMap> {
    match format {
        RecordFormat::Marc => Ok(marcxml::marcxml_to_record(raw)?
            .map(|record| field_paths::parse(&record, options))
            .unwrap_or_default()),
        RecordFormat::Edm => edm::parse(raw),
    }
}

/// Parse a batch of raw record snapshots in parallel.
///
/// Returns one field map per input record, in input order, plus the number
/// of records that failed structurally (those yield empty maps).
#[must_use]
pub fn parse_records_parallel(
    records: &[String],
    format: RecordFormat,
    options: &ParseOptions,
) -> (Vec<FieldMap>, usize) {
    let failures = AtomicUsize::new(0);

    let maps = records
        .par_iter()
        .enumerate()
        .map(|(index, raw)| match parse_record(raw, format, options) {
            Ok(map) => map,
            Err(e) => {
                warn!("record {index} failed to parse and was skipped: {e}");
                failures.fetch_add(1, Ordering::Relaxed);
                FieldMap::new()
            }
        })
        .collect();

    (maps, failures.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marc_snippet(id: &str, title: &str) -> String {
        format!(
            r#"<record><metadata>
                <marc:record xmlns:marc="http://www.loc.gov/MARC21/slim">
                    <marc:controlfield tag="001">{id}</marc:controlfield>
                    <marc:datafield tag="245" ind1="1" ind2="0">
                        <marc:subfield code="a">{title}</marc:subfield>
                    </marc:datafield>
                </marc:record>
            </metadata></record>"#
        )
    }

    #[test]
    fn test_output_order_matches_input_order() {
        let records: Vec<String> = (0..64)
            .map(|i| marc_snippet(&format!("id{i}"), &format!("Title {i}")))
            .collect();

        let (maps, failures) =
            parse_records_parallel(&records, RecordFormat::Marc, &ParseOptions::default());

        assert_eq!(failures, 0);
        assert_eq!(maps.len(), 64);
        for (i, map) in maps.iter().enumerate() {
            assert_eq!(map["001"], format!("id{i}"));
        }
    }

    #[test]
    fn test_malformed_record_yields_empty_map_without_failing_batch() {
        let records = vec![
            marc_snippet("a", "First"),
            "<record><metadata></record>".to_string(),
            marc_snippet("c", "Third"),
        ];

        let (maps, failures) =
            parse_records_parallel(&records, RecordFormat::Marc, &ParseOptions::default());

        assert_eq!(failures, 1);
        assert_eq!(maps.len(), 3);
        assert_eq!(maps[0]["001"], "a");
        assert!(maps[1].is_empty());
        assert_eq!(maps[2]["001"], "c");
    }
}
