//! OAI-PMH transport client.
//!
//! One `ListRecords` request/response round-trip: [`OaiTransport::fetch`]
//! issues an HTTP GET against either an initial collection URL or a
//! resumption-token URL, parses the XML envelope, and returns the records
//! batch plus the continuation token. Pagination policy lives in the
//! harvester; this layer only adds a request timeout and a small bounded
//! retry for transient failures.
//!
//! The trait seam exists so the harvester can be driven by a scripted fake
//! in tests; [`HttpTransport`] is the production implementation.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{debug, warn};
use url::Url;

use crate::error::{OaiError, Result};
use crate::reader::{capture_element, element_text};

/// Default timeout for one HTTP request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default number of attempts for one fetch (first try plus retries).
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default pause between retries.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// One parsed `ListRecords` response.
#[derive(Debug, Clone)]
pub struct OaiResponse {
    /// Raw `<record>` XML snippets, excluding the trailing resumption token.
    pub records: Vec<String>,
    /// Continuation token, absent when the collection is exhausted.
    pub resumption_token: Option<String>,
    /// Raw `<responseDate>` element, echoed into the harvested document.
    pub response_date: Option<String>,
    /// Raw `<request>` element, echoed into the harvested document.
    pub request_echo: Option<String>,
}

/// A source of `ListRecords` batches.
///
/// Exactly one of `collection_url` / `token` must be provided; both or
/// neither fail with [`OaiError::InvalidRequest`].
pub trait OaiTransport {
    /// Fetch one batch, either the initial one (by collection URL) or a
    /// continuation (by resumption token).
    ///
    /// # Errors
    ///
    /// Implementations fail with [`OaiError::InvalidRequest`] on a bad
    /// argument combination, and with transport/XML errors as appropriate.
    fn fetch(&self, collection_url: Option<&str>, token: Option<&str>) -> Result<OaiResponse>;
}

/// HTTP implementation of [`OaiTransport`] over a blocking client.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    endpoint: Url,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpTransport {
    /// Create a transport for an OAI-PMH endpoint (the handler URL without
    /// query parameters).
    ///
    /// # Errors
    ///
    /// Returns [`OaiError::Transport`] if the HTTP client cannot be built.
    pub fn new(endpoint: Url) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("oaitab/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpTransport {
            client,
            endpoint,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Create a transport whose endpoint is derived from a full collection
    /// URL by dropping its query string.
    ///
    /// # Errors
    ///
    /// Returns [`OaiError::InvalidUrl`] if the URL does not parse.
    pub fn for_collection_url(collection_url: &str) -> Result<Self> {
        let mut endpoint = Url::parse(collection_url)?;
        endpoint.set_query(None);
        endpoint.set_fragment(None);
        Self::new(endpoint)
    }

    /// Override the number of attempts per fetch (minimum 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Override the pause between retries.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Build the continuation URL for a resumption token.
    fn resume_url(&self, token: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("verb", "ListRecords")
            .append_pair("resumptionToken", token);
        url
    }

    /// GET a URL, retrying transient failures a bounded number of times.
    fn get_with_retry(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_get(url) {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    warn!("attempt {attempt} failed ({e}), retrying {url}");
                    std::thread::sleep(self.retry_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_get(&self, url: &str) -> Result<String> {
        debug!("GET {url}");
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(OaiError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text()?)
    }
}

/// Whether an error is worth retrying.
fn is_transient(error: &OaiError) -> bool {
    match error {
        OaiError::Transport(_) => true,
        OaiError::HttpStatus { status, .. } => (500..=599).contains(status),
        _ => false,
    }
}

impl OaiTransport for HttpTransport {
    fn fetch(&self, collection_url: Option<&str>, token: Option<&str>) -> Result<OaiResponse> {
        let url = match (collection_url, token) {
            (Some(url), None) => url.to_string(),
            (None, Some(token)) => self.resume_url(token).to_string(),
            (Some(_), Some(_)) => return Err(OaiError::InvalidRequest("both")),
            (None, None) => return Err(OaiError::InvalidRequest("neither")),
        };

        let body = self.get_with_retry(&url)?;
        split_envelope(&body)
    }
}

/// Split a `ListRecords` response body into its envelope parts.
///
/// Extracts the raw `<record>` snippets (excluding the trailing
/// `resumptionToken` element), the continuation token (an empty token
/// element on the final batch counts as absent), and the raw
/// `responseDate`/`request` header elements.
///
/// # Errors
///
/// Returns [`OaiError::MalformedXml`] if the body fails to parse or the
/// server answered with an OAI-PMH `<error>` element.
pub fn split_envelope(body: &str) -> Result<OaiResponse> {
    let mut reader = Reader::from_reader(body.as_bytes());
    let mut buf = Vec::new();

    let mut records = Vec::new();
    let mut resumption_token = None;
    let mut response_date = None;
    let mut request_echo = None;
    let mut in_list_records = false;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Err(e) => {
                return Err(OaiError::MalformedXml(format!(
                    "failed to parse ListRecords response: {e}"
                )))
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"responseDate" if !in_list_records => {
                    let start = Event::Start(e).into_owned();
                    response_date = Some(capture_element(&mut reader, start)?);
                }
                b"request" if !in_list_records => {
                    let start = Event::Start(e).into_owned();
                    request_echo = Some(capture_element(&mut reader, start)?);
                }
                b"ListRecords" => in_list_records = true,
                b"record" if in_list_records => {
                    let start = Event::Start(e).into_owned();
                    records.push(capture_element(&mut reader, start)?);
                }
                b"resumptionToken" => {
                    let token = element_text(&mut reader)?;
                    let token = token.trim();
                    if !token.is_empty() {
                        resumption_token = Some(token.to_string());
                    }
                }
                b"error" => {
                    let code = e
                        .try_get_attribute("code")
                        .ok()
                        .flatten()
                        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
                        .unwrap_or_default();
                    let text = element_text(&mut reader)?;
                    return Err(OaiError::MalformedXml(format!(
                        "OAI-PMH error response [{code}]: {}",
                        text.trim()
                    )));
                }
                _ => {}
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"ListRecords" => {
                in_list_records = false;
            }
            Ok(_) => {}
        }
    }

    Ok(OaiResponse {
        records,
        resumption_token,
        response_date,
        request_echo,
    })
}
