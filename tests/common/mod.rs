//! Shared test helpers: a scripted OAI transport and record fixtures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use oaitab::transport::{OaiResponse, OaiTransport};
use oaitab::{OaiError, Result};

/// Transport that serves a pre-scripted sequence of responses, one per
/// fetch, optionally flipping a cancellation flag at a given call index.
pub struct ScriptedTransport {
    responses: Mutex<Vec<Result<OaiResponse>>>,
    cancel_on_call: Option<(usize, Arc<AtomicBool>)>,
    calls: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<OaiResponse>>) -> Self {
        let mut responses = responses;
        responses.reverse();
        ScriptedTransport {
            responses: Mutex::new(responses),
            cancel_on_call: None,
            calls: Mutex::new(0),
        }
    }

    /// Flip `flag` when serving the fetch with the given zero-based index.
    #[allow(dead_code)]
    pub fn cancel_on_call(mut self, call: usize, flag: Arc<AtomicBool>) -> Self {
        self.cancel_on_call = Some((call, flag));
        self
    }
}

impl OaiTransport for ScriptedTransport {
    fn fetch(&self, _collection_url: Option<&str>, _token: Option<&str>) -> Result<OaiResponse> {
        let mut calls = self.calls.lock().unwrap();
        if let Some((call, flag)) = &self.cancel_on_call {
            if *calls == *call {
                flag.store(true, Ordering::Relaxed);
            }
        }
        *calls += 1;

        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(OaiError::InvalidRequest("neither")))
    }
}

/// One OAI record wrapper embedding a minimal MARC record.
pub fn marc_record(id: &str, title: &str) -> String {
    format!(
        r#"<record><header><identifier>oai:erb:{id}</identifier></header><metadata><marc:record xmlns:marc="http://www.loc.gov/MARC21/slim"><marc:leader>01234nam a2200289 a 4500</marc:leader><marc:controlfield tag="001">{id}</marc:controlfield><marc:datafield tag="245" ind1="1" ind2="0"><marc:subfield code="a">{title}</marc:subfield></marc:datafield></marc:record></metadata></record>"#
    )
}

/// A `ListRecords` batch response built from record snippets.
pub fn batch(records: Vec<String>, token: Option<&str>) -> OaiResponse {
    OaiResponse {
        records,
        resumption_token: token.map(String::from),
        response_date: Some("<responseDate>2023-04-11T07:42:12Z</responseDate>".to_string()),
        request_echo: Some(
            r#"<request verb="ListRecords" set="erb" metadataPrefix="marc21xml">https://data.digar.ee/repox/OAIHandler</request>"#
                .to_string(),
        ),
    }
}
