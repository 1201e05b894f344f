//! HTTP report sink.
//!
//! POSTs the finished report as JSON to a configured endpoint, e.g. a
//! collector service or a search index for later querying. Transmission
//! failures never affect the analysis itself; the caller decides whether
//! a failed POST is fatal.

use crate::parser::schema::Report;
use crate::utils::config::DEFAULT_SINK_TIMEOUT;
use crate::utils::error::SinkError;
use log::{debug, info};
use reqwest::blocking::Client;

/// Blocking HTTP sink for analysis reports
pub struct HttpSink {
    client: Client,
    url: String,
}

impl HttpSink {
    /// Create a new sink for the given endpoint URL
    pub fn new(url: impl Into<String>) -> Result<Self, SinkError> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SinkError::InvalidUrl(url));
        }

        let client = Client::builder()
            .timeout(DEFAULT_SINK_TIMEOUT)
            .build()
            .map_err(SinkError::RequestFailed)?;

        Ok(Self { client, url })
    }

    /// POST a report as JSON
    ///
    /// # Errors
    /// * `SinkError::RequestFailed` - connection or serialization failure
    /// * `SinkError::Rejected` - endpoint answered with a non-success status
    pub fn post_report(&self, report: &Report) -> Result<(), SinkError> {
        info!("Posting report to: {}", self.url);
        debug!("Report version: {}", report.version);

        let response = self
            .client
            .post(&self.url)
            .json(report)
            .send()
            .map_err(SinkError::RequestFailed)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        info!("Report accepted by sink (HTTP {})", status.as_u16());
        Ok(())
    }
}
