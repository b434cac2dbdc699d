use std::time::Duration;

use logging_timer::timer;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::es_client::EsClient;
use crate::models::bulk::{render_bulk, BulkItem, BulkOutcome};

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

impl EsClient {
    /// Submit caller-assembled newline-delimited bulk content. With a
    /// `(index, type)` scope the per-line meta may omit the address;
    /// without one every action line must carry its own.
    pub async fn bulk_raw(&self, scope: Option<(&str, &str)>, ndjson: String) -> BulkOutcome {
        let url = match scope {
            Some((index, doc_type)) => {
                format!("{}/{}/{}/_bulk", self.base(), index, doc_type)
            }
            None => format!("{}/_bulk", self.base()),
        };
        self.submit_bulk(&url, ndjson).await
    }

    /// Submit ordered, explicitly-addressed items against `/_bulk`.
    pub async fn bulk(&self, items: &[BulkItem]) -> BulkOutcome {
        self.bulk_raw(None, render_bulk(items)).await
    }

    /// Index documents into one index/type. `docs` pairs ids with
    /// already-serialized JSON sources; input order is kept on the wire.
    pub async fn bulk_insert(
        &self,
        index: &str,
        doc_type: &str,
        docs: &[(String, String)],
    ) -> BulkOutcome {
        if index.is_empty() || doc_type.is_empty() {
            return BulkOutcome::RequestFailure(json!({
                "msg": "bulk insert must specify index and type"
            }));
        }
        let mut entity = String::new();
        for (id, source) in docs {
            entity.push_str(&json!({ "index": { "_id": id } }).to_string());
            entity.push('\n');
            entity.push_str(source);
            entity.push('\n');
        }
        self.bulk_raw(Some((index, doc_type)), entity).await
    }

    /// Partially update documents in one index/type. The `upsert` flag
    /// applies to the whole batch, not per document.
    pub async fn bulk_update(
        &self,
        index: &str,
        doc_type: &str,
        docs: &[(String, Value)],
        upsert: bool,
    ) -> BulkOutcome {
        if index.is_empty() || doc_type.is_empty() {
            return BulkOutcome::RequestFailure(json!({
                "msg": "bulk update must specify index and type"
            }));
        }
        let items: Vec<BulkItem> = docs
            .iter()
            .map(|(id, doc)| {
                let mut envelope = json!({ "doc": doc });
                if upsert {
                    envelope["doc_as_upsert"] = json!(true);
                }
                BulkItem::update_doc(id.clone(), envelope)
            })
            .collect();
        self.bulk_raw(Some((index, doc_type)), render_bulk(&items))
            .await
    }

    /// Update documents through a server-side script file, one script for
    /// the whole batch, per-document params. When `lang` is `None` the
    /// endpoint's generation picks the language. `upsert` applies the
    /// params document as the initial value for missing ids, batch-wide.
    pub async fn bulk_update_by_script(
        &self,
        index: &str,
        doc_type: &str,
        params: &[(String, Value)],
        script_file: &str,
        lang: Option<&str>,
        upsert: bool,
    ) -> BulkOutcome {
        if index.is_empty() || doc_type.is_empty() {
            return BulkOutcome::RequestFailure(json!({
                "msg": "bulk update must specify index and type"
            }));
        }
        let lang = lang.unwrap_or_else(|| self.get_endpoint().get_version().default_script_lang());
        let items: Vec<BulkItem> = params
            .iter()
            .map(|(id, param)| {
                let mut envelope = json!({
                    "script": { "lang": lang, "file": script_file, "params": param }
                });
                if upsert {
                    envelope["upsert"] = param.clone();
                }
                BulkItem::update_doc(id.clone(), envelope)
            })
            .collect();
        self.bulk_raw(Some((index, doc_type)), render_bulk(&items))
            .await
    }

    /// Delete documents across indices. Each target is `(index, type, id)`.
    pub async fn bulk_delete(&self, targets: &[(String, String, String)]) -> BulkOutcome {
        let items: Vec<BulkItem> = targets
            .iter()
            .map(|(index, doc_type, id)| {
                BulkItem::delete_doc(id.clone()).addressed(index.clone(), doc_type.clone())
            })
            .collect();
        self.bulk(&items).await
    }

    async fn submit_bulk(&self, url: &str, ndjson: String) -> BulkOutcome {
        let _tmr = timer!("BULK_SUBMIT");
        match self.executor().post(url, ndjson).await {
            Ok(response) => BulkOutcome::from_http(response.status(), response.body()),
            Err(err) => {
                warn!("bulk request failed on {}: {}", url, err);
                BulkOutcome::RequestFailure(json!({ "msg": err.to_string() }))
            }
        }
    }
}

/// Time-windowed accumulator for bulk inserts.
///
/// Every insert lands in an in-memory buffer; once the flush interval has
/// elapsed since the last flush, the triggering insert submits the whole
/// buffer and blocks until the engine answers. Anything buffered since the
/// last successful flush lives only in memory, so a crash loses at most one
/// interval's worth of inserts. That window is the accepted trade-off for
/// collapsing thousands of small writes into one request.
///
/// Not internally synchronized: the `&mut self` receivers enforce a single
/// writer. Concurrent producers must either serialize behind their own lock
/// or own one writer each.
#[derive(Debug)]
pub struct BufferedBulkWriter {
    client: EsClient,
    buffer: String,
    count: usize,
    last_flush: Instant,
    interval: Duration,
}

impl BufferedBulkWriter {
    pub fn new(client: EsClient) -> Self {
        Self {
            client,
            buffer: String::new(),
            count: 0,
            last_flush: Instant::now(),
            interval: DEFAULT_FLUSH_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Buffered documents not yet submitted.
    pub fn pending(&self) -> usize {
        self.count
    }

    /// Append one insert. Returns `None` when the document was only
    /// buffered, `Some(outcome)` when this call crossed the flush window
    /// and submitted the buffer (the current document included).
    pub async fn insert(
        &mut self,
        index: &str,
        doc_type: &str,
        id: &str,
        source: &str,
    ) -> Option<BulkOutcome> {
        let meta = json!({
            "index": { "_index": index, "_type": doc_type, "_id": id }
        });
        self.buffer.push_str(&meta.to_string());
        self.buffer.push('\n');
        self.buffer.push_str(source);
        self.buffer.push('\n');
        self.count += 1;

        if self.last_flush.elapsed() > self.interval {
            Some(self.flush().await)
        } else {
            None
        }
    }

    /// Submit whatever is buffered, resetting the window. A drained buffer
    /// flushes to `Success` without touching the network.
    pub async fn flush(&mut self) -> BulkOutcome {
        let entity = std::mem::take(&mut self.buffer);
        let count = self.count;
        self.count = 0;
        self.last_flush = Instant::now();

        if entity.is_empty() {
            return BulkOutcome::Success;
        }

        debug!("flushing {} buffered document(s)", count);
        let outcome = self.client.bulk_raw(None, entity).await;
        if let Some(message) = outcome.error_message() {
            warn!("buffered bulk flush failed: {}", message);
        }
        outcome
    }
}
