//! Integration tests for the streaming harvest coordinator: completeness,
//! partial failure, and cancellation, all against a scripted transport.

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use common::{batch, marc_record, ScriptedTransport};
use oaitab::reader::OaiRecordReader;
use oaitab::{Harvester, OaiError};

/// Build batches of `batch_size` records covering `total` records, with
/// server-style resumption tokens between them.
fn scripted_collection(total: usize, batch_size: usize) -> Vec<oaitab::Result<oaitab::OaiResponse>> {
    let mut responses = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + batch_size).min(total);
        let records: Vec<String> = (start..end)
            .map(|i| marc_record(&format!("b{i}"), &format!("Raamat {i}")))
            .collect();
        let token = if end < total {
            Some(format!("session:erb:marc21xml:{end}:{total}"))
        } else {
            None
        };
        responses.push(Ok(batch(records, token.as_deref())));
        start = end;
    }
    responses
}

fn parse_back(document: &[u8]) -> Vec<String> {
    OaiRecordReader::new(document)
        .collect::<oaitab::Result<Vec<String>>>()
        .expect("harvested document must be well-formed")
}

#[test]
fn harvest_writes_every_record_across_batches() {
    let mut out = Vec::new();
    let written = Harvester::new(ScriptedTransport::new(scripted_collection(25, 10)))
        .with_progress(false)
        .harvest("https://example.org/oai?verb=ListRecords&set=erb", &mut out)
        .unwrap();

    assert_eq!(written, 25);

    let records = parse_back(&out);
    assert_eq!(records.len(), 25);
    assert!(records[0].contains("<marc:controlfield tag=\"001\">b0</marc:controlfield>"));
    assert!(records[24].contains("b24"));
}

#[test]
fn harvested_document_carries_envelope_metadata() {
    let mut out = Vec::new();
    Harvester::new(ScriptedTransport::new(scripted_collection(3, 10)))
        .with_progress(false)
        .harvest("https://example.org/oai?verb=ListRecords&set=erb", &mut out)
        .unwrap();

    let document = String::from_utf8(out).unwrap();
    assert!(document.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(document.contains("<OAI-PMH xmlns=\"http://www.openarchives.org/OAI/2.0/\""));
    assert!(document.contains("<responseDate>2023-04-11T07:42:12Z</responseDate>"));
    assert!(document.contains("<request verb=\"ListRecords\""));
    assert!(document.trim_end().ends_with("</OAI-PMH>"));
}

#[test]
fn transport_failure_leaves_well_formed_partial_file() {
    // Two good batches of 10 (the second still pointing at more records),
    // then the server goes away.
    let mut responses = scripted_collection(30, 10);
    responses.truncate(2);
    responses.push(Err(OaiError::HttpStatus {
        status: 502,
        url: "https://example.org/oai".to_string(),
    }));

    let mut out = Vec::new();
    let err = Harvester::new(ScriptedTransport::new(responses))
        .with_progress(false)
        .harvest("https://example.org/oai?verb=ListRecords&set=erb", &mut out)
        .unwrap_err();

    match err {
        OaiError::IncompleteHarvest { written, source } => {
            assert_eq!(written, 20);
            assert!(matches!(*source, OaiError::HttpStatus { status: 502, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The partial document still parses, with exactly the records that
    // arrived before the failure.
    assert_eq!(parse_back(&out).len(), 20);
}

#[test]
fn cancellation_mid_harvest_preserves_written_records() {
    let flag = Arc::new(AtomicBool::new(false));
    // The flag flips while the second fetch is being served, so the
    // harvester stops before requesting the third batch.
    let transport = ScriptedTransport::new(scripted_collection(30, 10))
        .cancel_on_call(1, Arc::clone(&flag));

    let mut out = Vec::new();
    let err = Harvester::new(transport)
        .with_progress(false)
        .with_cancel_flag(flag)
        .harvest("https://example.org/oai?verb=ListRecords&set=erb", &mut out)
        .unwrap_err();

    match err {
        OaiError::IncompleteHarvest { written, source } => {
            assert_eq!(written, 20);
            assert!(matches!(*source, OaiError::Cancelled));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(parse_back(&out).len(), 20);
}

#[test]
fn single_batch_collection_needs_no_token() {
    let mut out = Vec::new();
    let written = Harvester::new(ScriptedTransport::new(scripted_collection(5, 10)))
        .with_progress(false)
        .harvest("https://example.org/oai?verb=ListRecords&set=erb", &mut out)
        .unwrap();

    assert_eq!(written, 5);
    assert_eq!(parse_back(&out).len(), 5);
}
