use serde_json::Value;

use crate::error::{EsError, EsResult};

/// One page of a scrolled search.
#[derive(Debug, Clone)]
pub struct ScrollResponse {
    scroll_id: String,
    total_docs: u64,
    docs: Vec<ScrollDoc>,
}

#[derive(Debug, Clone)]
pub struct ScrollDoc {
    id: String,
    index_name: String,
    doc_type: String,
    source: Value,
}

impl ScrollResponse {
    /// Parse a `_search?scroll` / `_search/scroll` response body.
    ///
    /// `hits.total` arrives as a bare number from the older generations and
    /// as `{"value": n}` from newer servers; both shapes are accepted.
    pub fn parse(body: &str) -> EsResult<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| EsError::Parse(format!("scroll response is not JSON: {e}")))?;

        let scroll_id = value["_scroll_id"]
            .as_str()
            .ok_or_else(|| EsError::Parse("scroll response missing _scroll_id".to_string()))?
            .to_string();

        let total = &value["hits"]["total"];
        let total_docs = total
            .as_u64()
            .or_else(|| total["value"].as_u64())
            .ok_or_else(|| EsError::Parse("scroll response missing hits.total".to_string()))?;

        let hits = value["hits"]["hits"]
            .as_array()
            .ok_or_else(|| EsError::Parse("scroll response missing hits.hits".to_string()))?;

        let mut docs: Vec<ScrollDoc> = Vec::with_capacity(hits.len());
        for hit in hits {
            let id = hit["_id"]
                .as_str()
                .ok_or_else(|| EsError::Parse("hit missing _id".to_string()))?
                .to_string();
            let index_name = hit["_index"]
                .as_str()
                .ok_or_else(|| EsError::Parse("hit missing _index".to_string()))?
                .to_string();
            let doc_type = hit["_type"].as_str().unwrap_or("_doc").to_string();
            let source = hit.get("_source").cloned().unwrap_or(Value::Null);

            docs.push(ScrollDoc {
                id,
                index_name,
                doc_type,
                source,
            });
        }

        Ok(Self {
            scroll_id,
            total_docs,
            docs,
        })
    }

    pub fn get_scroll_id(&self) -> &String {
        &self.scroll_id
    }
    pub fn get_docs(&self) -> &Vec<ScrollDoc> {
        &self.docs
    }
    pub fn get_current_size(&self) -> u64 {
        self.docs.len() as u64
    }
    pub fn has_docs(&self) -> bool {
        !self.docs.is_empty()
    }
    pub fn get_total_size(&self) -> u64 {
        self.total_docs
    }
}

impl ScrollDoc {
    pub fn get_id(&self) -> &String {
        &self.id
    }
    pub fn get_index_name(&self) -> &String {
        &self.index_name
    }
    pub fn get_doc_type(&self) -> &String {
        &self.doc_type
    }
    pub fn get_source(&self) -> &Value {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_bare_number_total_shape() {
        let body = r#"{
            "_scroll_id": "abc",
            "hits": {
                "total": 42,
                "hits": [
                    {"_id": "1", "_index": "logs", "_type": "event", "_source": {"x": 1}}
                ]
            }
        }"#;
        let page = ScrollResponse::parse(body).unwrap();
        assert_eq!(page.get_scroll_id(), "abc");
        assert_eq!(page.get_total_size(), 42);
        assert_eq!(page.get_current_size(), 1);
        assert_eq!(page.get_docs()[0].get_doc_type(), "event");
    }

    #[test]
    fn parses_the_object_total_shape() {
        let body = r#"{
            "_scroll_id": "abc",
            "hits": {"total": {"value": 7, "relation": "eq"}, "hits": []}
        }"#;
        let page = ScrollResponse::parse(body).unwrap();
        assert_eq!(page.get_total_size(), 7);
        assert!(!page.has_docs());
    }

    #[test]
    fn missing_scroll_id_is_a_parse_error() {
        let err = ScrollResponse::parse(r#"{"hits":{"total":0,"hits":[]}}"#).unwrap_err();
        assert!(matches!(err, EsError::Parse(_)));
    }
}
