use crate::collectors::parse::{parse_output, OutputFormat};
use crate::collectors::{CollectFuture, Collector};
use crate::error::CollectorError;
use crate::state::ValueKind;
use log::info;
use reqwest::Client;
use std::time::Duration;

/// Collector that fetches the current state as a JSON mapping over HTTP
///
/// Used when scraping runs as a separate service that publishes its result.
pub struct HttpCollector {
    client: Client,
    url: String,
    expected: ValueKind,
}

impl HttpCollector {
    pub fn new(url: String, expected: ValueKind, timeout: Duration) -> Result<Self, CollectorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            expected,
        })
    }
}

impl Collector for HttpCollector {
    fn collect(&self) -> CollectFuture<'_> {
        Box::pin(async move {
            let body = self
                .client
                .get(&self.url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            let entries = parse_output(OutputFormat::Json, &body, self.expected)?;
            info!("Collected {} entries from {}", entries.len(), self.url);
            Ok(entries)
        })
    }
}
