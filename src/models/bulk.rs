use serde_json::{json, Value};

/// One action in a bulk submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOp {
    /// Index the document, overwriting any existing one.
    Index,
    /// Partial update, optionally upserting.
    Update,
    /// Remove the document. Contributes no payload line.
    Delete,
}

impl BulkOp {
    pub fn wire_name(&self) -> &'static str {
        match self {
            BulkOp::Index => "index",
            BulkOp::Update => "update",
            BulkOp::Delete => "delete",
        }
    }
}

/// A single bulk action plus its payload line, if the action carries one.
///
/// Items scoped by a `/{index}/{type}/_bulk` URL omit `_index`/`_type` from
/// their meta line; items submitted against the bare `/_bulk` endpoint carry
/// the full address. Input order is preserved on the wire.
#[derive(Debug, Clone)]
pub struct BulkItem {
    op: BulkOp,
    index: Option<String>,
    doc_type: Option<String>,
    id: String,
    payload: Option<Value>,
}

impl BulkItem {
    pub fn index_doc(id: impl Into<String>, payload: Value) -> Self {
        Self {
            op: BulkOp::Index,
            index: None,
            doc_type: None,
            id: id.into(),
            payload: Some(payload),
        }
    }

    pub fn update_doc(id: impl Into<String>, payload: Value) -> Self {
        Self {
            op: BulkOp::Update,
            index: None,
            doc_type: None,
            id: id.into(),
            payload: Some(payload),
        }
    }

    pub fn delete_doc(id: impl Into<String>) -> Self {
        Self {
            op: BulkOp::Delete,
            index: None,
            doc_type: None,
            id: id.into(),
            payload: None,
        }
    }

    /// Address the item explicitly, for submissions against bare `/_bulk`.
    pub fn addressed(mut self, index: impl Into<String>, doc_type: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn get_op(&self) -> BulkOp {
        self.op
    }
    pub fn get_id(&self) -> &str {
        &self.id
    }
    pub fn get_payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    fn action_line(&self) -> Value {
        let mut meta = json!({ "_id": self.id });
        if let Some(index) = &self.index {
            meta["_index"] = json!(index);
        }
        if let Some(doc_type) = &self.doc_type {
            meta["_type"] = json!(doc_type);
        }
        let mut action = serde_json::Map::new();
        action.insert(self.op.wire_name().to_string(), meta);
        Value::Object(action)
    }
}

/// Serialize ordered items into the newline-delimited bulk payload: one
/// action/meta line per item, one payload line for index/update.
pub fn render_bulk(items: &[BulkItem]) -> String {
    let mut out = String::new();
    for item in items {
        out.push_str(&item.action_line().to_string());
        out.push('\n');
        if let Some(payload) = &item.payload {
            out.push_str(&payload.to_string());
            out.push('\n');
        }
    }
    out
}

/// Outcome of one bulk submission.
#[derive(Debug, Clone)]
pub enum BulkOutcome {
    /// Every action applied.
    Success,
    /// The request went through but some actions failed; the per-item
    /// results are handed to the caller for remediation.
    PartialFailure(Vec<Value>),
    /// The submission itself failed, before per-item processing.
    RequestFailure(Value),
}

impl BulkOutcome {
    /// Classify a bulk HTTP exchange.
    pub fn from_http(status: u16, body: &str) -> Self {
        if status != 200 {
            let error = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("error").cloned())
                .unwrap_or_else(|| json!({ "status": status, "body": body }));
            return BulkOutcome::RequestFailure(error);
        }
        match serde_json::from_str::<Value>(body) {
            Ok(response) => {
                let has_errors = response
                    .get("errors")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if !has_errors {
                    BulkOutcome::Success
                } else {
                    let items = response
                        .get("items")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    BulkOutcome::PartialFailure(items)
                }
            }
            Err(e) => BulkOutcome::RequestFailure(json!({
                "msg": format!("unparseable bulk response: {e}")
            })),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BulkOutcome::Success)
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            BulkOutcome::Success => None,
            BulkOutcome::PartialFailure(items) => {
                Some(format!("{} action(s) reported item errors", items.len()))
            }
            BulkOutcome::RequestFailure(error) => Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_lines(rendered: &str) -> Vec<Value> {
        rendered
            .lines()
            .map(|l| serde_json::from_str(l).expect("every line is JSON"))
            .collect()
    }

    #[test]
    fn mixed_kinds_render_one_action_line_each_and_payloads_in_order() {
        let items = vec![
            BulkItem::index_doc("1", json!({"x": 1})),
            BulkItem::delete_doc("2").addressed("idx", "t"),
            BulkItem::update_doc("3", json!({"doc": {"y": 2}})),
        ];
        let rendered = render_bulk(&items);
        assert!(rendered.ends_with('\n'));

        let lines = parse_lines(&rendered);
        // 3 action lines + payload for index and update, delete has none.
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0]["index"]["_id"], "1");
        assert_eq!(lines[1], json!({"x": 1}));
        assert_eq!(lines[2]["delete"]["_id"], "2");
        assert_eq!(lines[2]["delete"]["_index"], "idx");
        assert_eq!(lines[2]["delete"]["_type"], "t");
        assert_eq!(lines[3]["update"]["_id"], "3");
        assert_eq!(lines[4]["doc"]["y"], 2);
    }

    #[test]
    fn scoped_items_omit_index_and_type_from_meta() {
        let rendered = render_bulk(&[BulkItem::index_doc("7", json!({}))]);
        let lines = parse_lines(&rendered);
        assert!(lines[0]["index"].get("_index").is_none());
        assert!(lines[0]["index"].get("_type").is_none());
    }

    #[test]
    fn errors_false_maps_to_success() {
        let outcome = BulkOutcome::from_http(200, r#"{"took":3,"errors":false,"items":[]}"#);
        assert!(outcome.is_success());
        assert!(outcome.error_message().is_none());
    }

    #[test]
    fn errors_true_carries_the_items_array() {
        let body = r#"{"errors":true,"items":[{"index":{"_id":"1","status":409}}]}"#;
        match BulkOutcome::from_http(200, body) {
            BulkOutcome::PartialFailure(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0]["index"]["_id"], "1");
            }
            other => panic!("expected PartialFailure, got {other:?}"),
        }
    }

    #[test]
    fn non_200_carries_the_parsed_error_object() {
        let body = r#"{"error":{"type":"index_not_found_exception"},"status":404}"#;
        match BulkOutcome::from_http(404, body) {
            BulkOutcome::RequestFailure(error) => {
                assert_eq!(error["type"], "index_not_found_exception");
            }
            other => panic!("expected RequestFailure, got {other:?}"),
        }
    }

    #[test]
    fn non_200_with_unparseable_body_still_reports_request_failure() {
        match BulkOutcome::from_http(502, "bad gateway") {
            BulkOutcome::RequestFailure(error) => assert_eq!(error["status"], 502),
            other => panic!("expected RequestFailure, got {other:?}"),
        }
    }
}
