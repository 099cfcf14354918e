// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Spreadsheet source access.
//!
//! Defines the [`SourceReader`] seam the sync engine and the HTTP facade
//! consume, plus [`SheetSource`], the production implementation over a
//! Google-Sheets-style values endpoint.
//!
//! # Grid Semantics
//!
//! The values endpoint returns the sheet as a grid:
//!
//! ```json
//! {
//!   "range": "Sheet1!A1:C3",
//!   "majorDimension": "ROWS",
//!   "values": [
//!     ["id", "name", "email"],
//!     ["1", "Alice", "alice@example.com"],
//!     ["2", "Bob"]
//!   ]
//! }
//! ```
//!
//! The first row is the header; each following row becomes a
//! [`Record`] mapping header cell to value. Rows shorter than the header are
//! padded with `""` (the API omits trailing empty cells), surplus cells
//! beyond the header are dropped, and duplicate header names are a parse
//! failure. An empty grid yields zero records.
//!
//! # Failure Semantics
//!
//! `fetch()` returns failures as data - a tagged [`MirrorError`], never a
//! panic. Transport errors are retried with exponential backoff up to the
//! configured attempt budget; parse failures are not (the payload will not
//! get better on retry).

use crate::config::SourceConfig;
use crate::error::{MirrorError, Result};
use crate::metrics;
use crate::record::Record;
use crate::resilience::RetryConfig;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tracing::{debug, warn};

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Trait defining what the rest of the system needs from the source.
///
/// The engine and the HTTP facade hold a `dyn SourceReader`, so tests swap
/// in a scripted implementation without any network.
pub trait SourceReader: Send + Sync {
    /// Fetch the full current dataset, in source row order.
    fn fetch(&self) -> BoxFuture<'_, Vec<Record>>;
}

/// Response shape of the values endpoint.
#[derive(Debug, Deserialize)]
struct ValueGrid {
    /// Row-major cell grid. Absent entirely for an empty sheet.
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Convert a raw cell grid into records.
///
/// The first row is the header row; see the module docs for padding,
/// truncation, and duplicate-header rules.
pub fn records_from_grid(mut grid: Vec<Vec<Value>>) -> Result<Vec<Record>> {
    if grid.is_empty() {
        return Ok(Vec::new());
    }

    let header_cells = grid.remove(0);
    let mut headers = Vec::with_capacity(header_cells.len());
    for cell in &header_cells {
        headers.push(cell_to_header(cell));
    }

    // Trailing blank header cells are a sheet formatting artifact, not columns.
    while headers.last().is_some_and(String::is_empty) {
        headers.pop();
    }

    for (i, name) in headers.iter().enumerate() {
        if name.is_empty() {
            return Err(MirrorError::Parse(format!("empty header cell at column {i}")));
        }
        if headers[..i].contains(name) {
            return Err(MirrorError::Parse(format!("duplicate header: {name}")));
        }
    }

    let mut records = Vec::with_capacity(grid.len());
    for mut row in grid {
        row.truncate(headers.len());
        while row.len() < headers.len() {
            row.push(Value::String(String::new()));
        }
        records.push(headers.iter().cloned().zip(row).collect());
    }

    Ok(records)
}

fn cell_to_header(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Production source reader over the spreadsheet values API.
pub struct SheetSource {
    client: reqwest::Client,
    url: String,
    api_token: Option<String>,
    retry: RetryConfig,
}

impl SheetSource {
    /// Create a source reader for the configured document.
    ///
    /// The underlying HTTP client carries the configured request timeout, so
    /// a hung source cannot block a sync cycle indefinitely.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        if config.document_id.is_empty() {
            return Err(MirrorError::Config("document_id must not be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout_duration())
            .build()
            .map_err(|e| MirrorError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.values_url(),
            api_token: config.api_token.clone(),
            retry: RetryConfig::fetch(config.fetch_attempts),
        })
    }

    /// The values endpoint URL this source reads from.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_once(&self) -> Result<Vec<Record>> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MirrorError::source("values_get", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::source_msg(
                "values_get",
                format!("unexpected status {status} from values endpoint"),
            ));
        }

        let grid: ValueGrid = response
            .json()
            .await
            .map_err(|e| MirrorError::Parse(format!("values payload is not a grid: {e}")))?;

        records_from_grid(grid.values)
    }
}

impl SourceReader for SheetSource {
    fn fetch(&self) -> BoxFuture<'_, Vec<Record>> {
        Box::pin(async move {
            let started = Instant::now();
            let mut attempt = 0;

            loop {
                attempt += 1;
                match self.fetch_once().await {
                    Ok(records) => {
                        metrics::record_fetch(true, records.len(), started.elapsed());
                        debug!(rows = records.len(), attempt, "Fetched sheet");
                        return Ok(records);
                    }
                    Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!(
                            error = %e,
                            attempt,
                            max_attempts = self.retry.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Sheet fetch failed, retrying"
                        );
                        metrics::record_fetch_retry("values_get");
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => {
                        metrics::record_fetch(false, 0, started.elapsed());
                        return Err(e);
                    }
                }
            }
        })
    }
}
