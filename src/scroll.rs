use std::io::Write;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{EsError, EsResult};
use crate::es_client::EsClient;
use crate::models::scroll_response::{ScrollDoc, ScrollResponse};

/// Server-side scroll context lifetime, refreshed on every fetch. The
/// context expires on its own once polling stops; there is no cleanup call.
pub const SCROLL_KEEP_ALIVE: &str = "5m";

impl EsClient {
    /// Open a scrolled search. The index may contain wildcards and must not
    /// be empty; type and query are optional.
    pub async fn scroll_start(
        &self,
        index: &str,
        doc_type: Option<&str>,
        query: Option<&Value>,
    ) -> EsResult<ScrollResponse> {
        if index.trim().is_empty() {
            return Err(EsError::Validation(
                "scroll requires an index pattern".to_string(),
            ));
        }
        let url = match doc_type {
            Some(doc_type) => format!(
                "{}/{}/{}/_search?scroll={}",
                self.base(),
                index,
                doc_type,
                SCROLL_KEEP_ALIVE
            ),
            None => format!(
                "{}/{}/_search?scroll={}",
                self.base(),
                index,
                SCROLL_KEEP_ALIVE
            ),
        };
        let body = query.map(|q| q.to_string()).unwrap_or_default();
        let response = self.executor().post(&url, body).await?;
        if response.status() != 200 {
            warn!("scroll open failed on {}: {}", url, response.body());
            return Err(EsError::Status {
                status: response.status(),
                body: response.into_body(),
            });
        }
        ScrollResponse::parse(response.body())
    }

    /// Fetch the next page for a cursor token, refreshing its window.
    pub async fn scroll_next(&self, scroll_id: &str) -> EsResult<ScrollResponse> {
        let url = format!(
            "{}/_search/scroll?scroll={}&scroll_id={}",
            self.base(),
            SCROLL_KEEP_ALIVE,
            scroll_id
        );
        let response = self.executor().get(&url).await?;
        if response.status() != 200 {
            warn!("scroll fetch failed on {}: {}", url, response.body());
            return Err(EsError::Status {
                status: response.status(),
                body: response.into_body(),
            });
        }
        ScrollResponse::parse(response.body())
    }

    /// Caller-driven pager over a scrolled search.
    pub fn scroll(&self, index: &str, doc_type: Option<&str>, query: Option<Value>) -> ScrollCursor {
        ScrollCursor {
            client: self.clone(),
            index: index.to_string(),
            doc_type: doc_type.map(str::to_string),
            query,
            scroll_id: None,
            total_docs: 0,
            fetched: 0,
            exhausted: false,
        }
    }
}

/// Drives a scroll to exhaustion, one page per call.
///
/// The cursor token is replaced after every page. A page with no hits marks
/// the cursor exhausted and clears the local token; further calls return
/// `Ok(None)` without touching the network.
#[derive(Debug)]
pub struct ScrollCursor {
    client: EsClient,
    index: String,
    doc_type: Option<String>,
    query: Option<Value>,
    scroll_id: Option<String>,
    total_docs: u64,
    fetched: u64,
    exhausted: bool,
}

impl ScrollCursor {
    pub async fn next_page(&mut self) -> EsResult<Option<ScrollResponse>> {
        if self.exhausted {
            return Ok(None);
        }

        let first = self.scroll_id.is_none();
        let page = match &self.scroll_id {
            None => {
                self.client
                    .scroll_start(&self.index, self.doc_type.as_deref(), self.query.as_ref())
                    .await?
            }
            Some(scroll_id) => self.client.scroll_next(scroll_id).await?,
        };

        self.scroll_id = Some(page.get_scroll_id().clone());
        if first {
            self.total_docs = page.get_total_size();
        }

        if !page.has_docs() {
            self.exhausted = true;
            self.scroll_id = None;
            debug!(
                "scroll on {} exhausted after {} of {} document(s)",
                self.index, self.fetched, self.total_docs
            );
            return Ok(None);
        }

        self.fetched += page.get_current_size();
        if self.total_docs > 0 {
            debug!(
                "scroll progress on {}: {}/{} ({:.1}%)",
                self.index,
                self.fetched,
                self.total_docs,
                self.fetched as f64 * 100.0 / self.total_docs as f64
            );
        }
        Ok(Some(page))
    }

    /// `(fetched, total)` so far; total is known after the first page.
    pub fn progress(&self) -> (u64, u64) {
        (self.fetched, self.total_docs)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Stream every remaining page through `map` into `out`, one line per
    /// mapped document (documents mapped to `None` are skipped). Returns
    /// the number of lines written.
    pub async fn drain_to<W, F>(mut self, out: &mut W, mut map: F) -> EsResult<u64>
    where
        W: Write,
        F: FnMut(&ScrollDoc) -> Option<String>,
    {
        let mut written: u64 = 0;
        while let Some(page) = self.next_page().await? {
            let mut chunk = String::new();
            for doc in page.get_docs() {
                if let Some(line) = map(doc) {
                    chunk.push_str(&line);
                    chunk.push('\n');
                    written += 1;
                }
            }
            out.write_all(chunk.as_bytes())?;
        }
        Ok(written)
    }
}
