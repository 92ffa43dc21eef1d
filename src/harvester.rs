//! Streaming harvest coordinator.
//!
//! [`Harvester::harvest`] drives an [`OaiTransport`] in a loop and writes
//! each batch of records straight into an OAI-PMH-shaped XML document on
//! disk, so at most one batch is resident in memory at any time. Batches are
//! strictly sequential; each request depends on the resumption token
//! returned by the previous response, and only server-supplied tokens drive
//! pagination.
//!
//! On a transport error, a malformed initial cursor, or cooperative
//! cancellation, the writer still closes every open XML tag before the call
//! fails with [`OaiError::IncompleteHarvest`] — a truncated harvest is a
//! well-formed document that is explicitly flagged in the logs, never a
//! silent success.
//!
//! # Examples
//!
//! ```no_run
//! use oaitab::harvester::Harvester;
//! use oaitab::transport::HttpTransport;
//! use std::fs::File;
//!
//! # fn main() -> oaitab::Result<()> {
//! let url = "https://data.digar.ee/repox/OAIHandler?verb=ListRecords&set=erb&metadataPrefix=marc21xml";
//! let transport = HttpTransport::for_collection_url(url)?;
//! let mut out = File::create("erb.xml")?;
//! let written = Harvester::new(transport).harvest(url, &mut out)?;
//! println!("harvested {written} records");
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::cursor::ResumptionCursor;
use crate::error::{OaiError, Result};
use crate::ns::{OAI_NS, OAI_SCHEMA_LOCATION, XSI_NS};
use crate::transport::OaiTransport;

/// Drives a transport through a full `ListRecords` harvest.
#[derive(Debug)]
pub struct Harvester<T> {
    transport: T,
    progress: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl<T: OaiTransport> Harvester<T> {
    /// Create a harvester over a transport.
    pub fn new(transport: T) -> Self {
        Harvester {
            transport,
            progress: true,
            cancel: None,
        }
    }

    /// Enable or disable the terminal progress bar.
    #[must_use]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Install a cooperative cancellation flag, checked between batches.
    ///
    /// When the flag becomes `true` the harvester closes the output document
    /// and returns [`OaiError::IncompleteHarvest`] with a
    /// [`OaiError::Cancelled`] cause.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Harvest a whole collection into `destination`.
    ///
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Fails with [`OaiError::IncompleteHarvest`] when the harvest is
    /// interrupted (the document is still closed properly), or with
    /// [`OaiError::Io`] if the destination itself cannot be written.
    pub fn harvest<W: Write>(&self, collection_url: &str, destination: &mut W) -> Result<u64> {
        let mut doc = EnvelopeWriter::begin(destination)?;
        let mut written = 0u64;

        let first = match self.transport.fetch(Some(collection_url), None) {
            Ok(response) => response,
            Err(e) => return Self::abort(doc, written, e),
        };

        doc.write_header(first.response_date.as_deref(), first.request_echo.as_deref())?;
        doc.open_list()?;

        // The initial token discloses the collection size; it must at least
        // decode, since all continuation requests are built from it.
        let bar = match &first.resumption_token {
            Some(token) => match ResumptionCursor::decode(token) {
                Ok(cursor) => self.make_bar(Some(cursor.collection_size())),
                Err(e) => return Self::abort(doc, written, e),
            },
            None => self.make_bar(Some(first.records.len() as u64)),
        };

        for record in &first.records {
            doc.write_record(record)?;
        }
        written += first.records.len() as u64;
        bar.inc(first.records.len() as u64);

        let mut token = first.resumption_token;
        while let Some(current) = token {
            if self.cancelled() {
                bar.abandon();
                return Self::abort(doc, written, OaiError::Cancelled);
            }

            match self.transport.fetch(None, Some(&current)) {
                Ok(batch) => {
                    for record in &batch.records {
                        doc.write_record(record)?;
                    }
                    written += batch.records.len() as u64;
                    bar.inc(batch.records.len() as u64);
                    token = batch.resumption_token;
                }
                Err(e) => {
                    bar.abandon();
                    return Self::abort(doc, written, e);
                }
            }
        }

        doc.close()?;
        bar.finish();
        info!("harvest complete: {written} records");
        Ok(written)
    }

    /// Close the document cleanly and report an interrupted harvest.
    fn abort<W: Write>(doc: EnvelopeWriter<'_, W>, written: u64, cause: OaiError) -> Result<u64> {
        doc.close()?;
        warn!("harvest interrupted after {written} records: {cause}; partial file is well-formed but incomplete");
        Err(OaiError::IncompleteHarvest {
            written,
            source: Box::new(cause),
        })
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Count-style bar when the server disclosed a total, hidden otherwise
    /// or when progress is off.
    fn make_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.green} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
                         elapsed: {elapsed_precise}  eta: {eta_precise}",
                    )
                    .unwrap()
                    .progress_chars("█▉▊▋▌▍▎▏  "),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.enable_steady_tick(std::time::Duration::from_millis(100));
                bar
            }
        }
    }
}

/// Writes the OAI-PMH-shaped output document, guaranteeing that every tag
/// opened is closed exactly once, whatever happens mid-harvest.
struct EnvelopeWriter<'a, W: Write> {
    dest: &'a mut W,
    list_open: bool,
}

impl<'a, W: Write> EnvelopeWriter<'a, W> {
    /// Write the XML declaration and the open envelope element.
    fn begin(dest: &'a mut W) -> Result<Self> {
        writeln!(dest, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(
            dest,
            "<OAI-PMH xmlns=\"{OAI_NS}\" xmlns:xsi=\"{XSI_NS}\" xsi:schemaLocation=\"{OAI_SCHEMA_LOCATION}\">"
        )?;
        Ok(EnvelopeWriter {
            dest,
            list_open: false,
        })
    }

    /// Echo the server's response metadata, when the response carried it.
    fn write_header(
        &mut self,
        response_date: Option<&str>,
        request_echo: Option<&str>,
    ) -> Result<()> {
        if let Some(response_date) = response_date {
            writeln!(self.dest, "{response_date}")?;
        }
        if let Some(request_echo) = request_echo {
            writeln!(self.dest, "{request_echo}")?;
        }
        Ok(())
    }

    fn open_list(&mut self) -> Result<()> {
        writeln!(self.dest, "<ListRecords>")?;
        self.list_open = true;
        Ok(())
    }

    fn write_record(&mut self, record: &str) -> Result<()> {
        writeln!(self.dest, "{record}")?;
        Ok(())
    }

    /// Close the records list (opening it first if the harvest never got
    /// that far) and the envelope, then flush.
    fn close(mut self) -> Result<()> {
        if !self.list_open {
            self.open_list()?;
        }
        writeln!(self.dest, "</ListRecords>")?;
        writeln!(self.dest, "</OAI-PMH>")?;
        self.dest.flush()?;
        Ok(())
    }
}
