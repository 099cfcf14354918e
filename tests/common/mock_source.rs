//! Mock SourceReader for testing.
//!
//! Returns a scripted dataset (or failure) per fetch and records how many
//! fetches happened, so tests can assert both the sync outcome and the
//! number of round trips to the "sheet".

use sheet_mirror::source::{BoxFuture, SourceReader};
use sheet_mirror::{MirrorError, Record};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One scripted fetch outcome.
#[derive(Debug, Clone)]
pub enum ScriptedFetch {
    /// Return these records.
    Rows(Vec<Record>),
    /// Fail with a source error carrying this message.
    Fail(String),
}

/// Mock implementation of SourceReader with scripted responses.
///
/// Each `fetch()` pops the front of the script queue; when the queue is
/// empty, the fallback response repeats forever.
///
/// # Example
/// ```rust,ignore
/// let source = MockSource::returning(vec![record(&[("id", json!("1"))])]);
/// source.push_failure("quota exceeded"); // next fetch fails once
/// ```
pub struct MockSource {
    script: Mutex<VecDeque<ScriptedFetch>>,
    fallback: Mutex<ScriptedFetch>,
    fetch_count: AtomicUsize,
}

impl MockSource {
    /// A source whose every fetch returns `rows`.
    pub fn returning(rows: Vec<Record>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(ScriptedFetch::Rows(rows)),
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// A source whose every fetch fails.
    pub fn failing(message: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(ScriptedFetch::Fail(message.to_string())),
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Queue a one-shot dataset ahead of the fallback.
    #[allow(dead_code)] // Not every test binary scripts one-shot rows
    pub fn push_rows(&self, rows: Vec<Record>) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedFetch::Rows(rows));
    }

    /// Queue a one-shot failure ahead of the fallback.
    #[allow(dead_code)]
    pub fn push_failure(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedFetch::Fail(message.to_string()));
    }

    /// Replace the fallback dataset.
    #[allow(dead_code)]
    pub fn set_rows(&self, rows: Vec<Record>) {
        *self.fallback.lock().unwrap() = ScriptedFetch::Rows(rows);
    }

    /// Replace the fallback with a failure.
    #[allow(dead_code)]
    pub fn set_failure(&self, message: &str) {
        *self.fallback.lock().unwrap() = ScriptedFetch::Fail(message.to_string());
    }

    /// How many times `fetch()` was called.
    #[allow(dead_code)]
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> ScriptedFetch {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }
        self.fallback.lock().unwrap().clone()
    }
}

impl SourceReader for MockSource {
    fn fetch(&self) -> BoxFuture<'_, Vec<Record>> {
        let response = self.next_response();
        Box::pin(async move {
            match response {
                ScriptedFetch::Rows(rows) => Ok(rows),
                ScriptedFetch::Fail(message) => Err(MirrorError::source_msg("mock_fetch", message)),
            }
        })
    }
}
