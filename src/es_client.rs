use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use crate::conf::Endpoint;
use crate::error::{EsError, EsResult};
use crate::executor::RequestExecutor;
use crate::models::server_info::ServerInfo;
use crate::retry::RetryPolicy;
use crate::transport::TransportPool;

/// Client for one endpoint. Cheap to clone; clones share the transport pool.
///
/// Primary read/write paths go through the pooled, retrying executor and
/// surface failures as [`EsError`]. Admin operations (index creation,
/// snapshots) use the single-attempt path.
#[derive(Debug, Clone)]
pub struct EsClient {
    endpoint: Endpoint,
    executor: RequestExecutor,
}

impl EsClient {
    pub fn new(endpoint: Endpoint, pool: Arc<TransportPool>, retry: RetryPolicy) -> Self {
        let executor = RequestExecutor::new(pool, endpoint.clone(), retry);
        Self { endpoint, executor }
    }

    pub fn get_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub(crate) fn base(&self) -> &str {
        self.endpoint.get_url()
    }

    pub async fn server_info(&self) -> EsResult<ServerInfo> {
        let url = format!("{}/", self.base());
        let response = self.executor.get(&url).await?;
        if response.status() != 200 {
            return Err(EsError::Status {
                status: response.status(),
                body: response.into_body(),
            });
        }
        serde_json::from_str(response.body())
            .map_err(|e| EsError::Parse(format!("unexpected server info payload: {e}")))
    }

    /// Fetch a document's source by id. `Ok(None)` when the document does
    /// not exist; any other non-200 status is surfaced as an error.
    pub async fn select_by_id(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
    ) -> EsResult<Option<String>> {
        require_identifiers(index, doc_type, id)?;
        let url = format!("{}/{}/{}/{}/_source", self.base(), index, doc_type, id);
        let response = self.executor.get(&url).await?;
        match response.status() {
            200 => Ok(Some(response.into_body())),
            404 => Ok(None),
            status => Err(EsError::Status {
                status,
                body: response.into_body(),
            }),
        }
    }

    /// Write one document, overwriting any existing one with the same id.
    pub async fn insert(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        source: &Value,
    ) -> EsResult<()> {
        require_identifiers(index, doc_type, id)?;
        // Stray whitespace in any identifier would split the path; strip it.
        let url = format!("{}/{}/{}/{}", self.base(), index, doc_type, id).replace(' ', "");
        let response = self.executor.put(&url, source.to_string()).await?;
        match response.status() {
            200 | 201 => Ok(()),
            status => {
                warn!(
                    "insert failed on {} with source {}: {}",
                    url,
                    source,
                    response.body()
                );
                Err(EsError::Status {
                    status,
                    body: response.into_body(),
                })
            }
        }
    }

    /// Partial update. With `upsert` the document is created when missing;
    /// without it a missing document is reported as [`EsError::DocumentMissing`].
    pub async fn update(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        source: &Value,
        upsert: bool,
    ) -> EsResult<()> {
        require_identifiers(index, doc_type, id)?;
        let url =
            format!("{}/{}/{}/{}/_update", self.base(), index, doc_type, id).replace(' ', "");
        let envelope = json!({ "doc": source, "doc_as_upsert": upsert });
        let response = self.executor.post(&url, envelope.to_string()).await?;
        match response.status() {
            200 | 201 => Ok(()),
            404 => {
                warn!("[{}][{}][{}]: document missing", index, doc_type, id);
                Err(EsError::DocumentMissing {
                    index: index.to_string(),
                    doc_type: doc_type.to_string(),
                    id: id.to_string(),
                })
            }
            status => {
                warn!(
                    "update failed on {} with envelope {}: {}",
                    url,
                    envelope,
                    response.body()
                );
                Err(EsError::Status {
                    status,
                    body: response.into_body(),
                })
            }
        }
    }

    /// Search or aggregation request. The index may contain wildcards and
    /// the type is optional; the query is an opaque JSON payload.
    pub async fn search(
        &self,
        index: &str,
        doc_type: Option<&str>,
        query: &Value,
    ) -> EsResult<String> {
        let url = match doc_type {
            Some(doc_type) => format!("{}/{}/{}/_search", self.base(), index, doc_type),
            None => format!("{}/{}/_search", self.base(), index),
        };
        let response = self.executor.post(&url, query.to_string()).await?;
        if response.status() != 200 {
            warn!("search failed on {}: {}", url, response.body());
            return Err(EsError::Status {
                status: response.status(),
                body: response.into_body(),
            });
        }
        Ok(response.into_body())
    }

    /// Batched search against one index/type, newline-delimited framing:
    /// an empty header line followed by the query, per request.
    pub async fn msearch(
        &self,
        index: &str,
        doc_type: Option<&str>,
        queries: &[Value],
    ) -> EsResult<String> {
        let url = match doc_type {
            Some(doc_type) => format!("{}/{}/{}/_msearch", self.base(), index, doc_type),
            None => format!("{}/{}/_msearch", self.base(), index),
        };
        let mut entity = String::new();
        for query in queries {
            entity.push_str("{}\n");
            entity.push_str(&query.to_string());
            entity.push('\n');
        }
        let response = self.executor.post(&url, entity).await?;
        if response.status() != 200 {
            warn!("msearch failed on {}: {}", url, response.body());
            return Err(EsError::Status {
                status: response.status(),
                body: response.into_body(),
            });
        }
        Ok(response.into_body())
    }

    /// Resolve an index pattern to concrete index names via `_cat/indices`.
    pub async fn get_index_names(&self, pattern: &str) -> EsResult<Vec<String>> {
        let url = format!("{}/_cat/indices/{}", self.base(), pattern);
        let response = self.executor.get(&url).await?;
        if response.status() != 200 {
            warn!("get index names failed: {}", response.body());
            return Err(EsError::Status {
                status: response.status(),
                body: response.into_body(),
            });
        }
        Ok(parse_cat_indices(response.body()))
    }

    pub async fn check_index_exist(&self, index: &str) -> bool {
        let url = format!("{}/{}/", self.base(), index);
        match self.executor.get(&url).await {
            Ok(response) => response.status() != 404,
            Err(e) => {
                warn!("index existence check failed on {}: {}", url, e);
                false
            }
        }
    }

    /// Create an index with the given mappings. Check existence first; the
    /// engine rejects a duplicate create. Admin path, single attempt.
    pub async fn create_index(&self, index: &str, mappings: &str) -> EsResult<()> {
        let url = format!("{}/{}/", self.base(), index);
        let response = self.executor.put_once(&url, mappings.to_string()).await?;
        if response.status() != 200 {
            warn!("create index failed: {}", response.body());
            return Err(EsError::Status {
                status: response.status(),
                body: response.into_body(),
            });
        }
        Ok(())
    }

    pub async fn get_mapping(&self, index: &str) -> EsResult<String> {
        let url = format!("{}/{}/_mapping", self.base(), index);
        let response = self.executor.get_once(&url).await?;
        if response.status() != 200 {
            return Err(EsError::Status {
                status: response.status(),
                body: response.into_body(),
            });
        }
        Ok(response.into_body())
    }
}

fn require_identifiers(index: &str, doc_type: &str, id: &str) -> EsResult<()> {
    if index.trim().is_empty() || doc_type.trim().is_empty() || id.trim().is_empty() {
        return Err(EsError::Validation(
            "[index], [type] and [id] must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// `_cat/indices` rows look like
/// `green open activation-2014 5 1 2944 4522 2.6mb 1.3mb`; the third
/// column is the index name.
fn parse_cat_indices(body: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in body.lines() {
        let mut columns = line.split_whitespace();
        match columns.nth(2) {
            Some(name) => names.push(name.to_string()),
            None => {
                if !line.trim().is_empty() {
                    warn!("skipping malformed _cat/indices row: {}", line);
                }
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cat_indices_rows_yield_the_third_column() {
        let body = "green open activation-2014 5 1 2944 4522 2.6mb 1.3mb\n\
                    yellow open logs-2015 5 1 10 0 1mb 1mb\n";
        assert_eq!(
            parse_cat_indices(body),
            vec!["activation-2014".to_string(), "logs-2015".to_string()]
        );
    }

    #[test]
    fn malformed_cat_rows_are_skipped() {
        assert!(parse_cat_indices("green open\n\n").is_empty());
    }

    #[test]
    fn blank_identifiers_are_rejected_before_any_io() {
        assert!(require_identifiers("i", "t", "1").is_ok());
        assert!(matches!(
            require_identifiers("", "t", "1"),
            Err(EsError::Validation(_))
        ));
        assert!(matches!(
            require_identifiers("i", "  ", "1"),
            Err(EsError::Validation(_))
        ));
    }

    #[test]
    fn document_paths_compose_index_type_id() {
        let url = format!("{}/{}/{}/{}", "http://h:9200", "a", "b", "1");
        let path: String = url.splitn(4, '/').nth(3).map(|p| format!("/{p}")).unwrap();
        assert_eq!(path, "/a/b/1");
    }
}
