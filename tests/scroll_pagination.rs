use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use es_bridge::{ClientConf, Endpoint, EsClient, EsVersion, TransportPool};

fn client_for(url: &str) -> EsClient {
    let conf = ClientConf::default();
    let endpoint = Endpoint::new("test", url, EsVersion::Es5);
    let pool = Arc::new(TransportPool::new(&conf, &[]).expect("pool"));
    EsClient::new(endpoint, pool, conf.retry_policy())
}

fn page(scroll_id: &str, total: u64, ids: &[&str]) -> String {
    let hits: Vec<_> = ids
        .iter()
        .map(|id| json!({"_id": id, "_index": "logs", "_type": "event", "_source": {"n": id}}))
        .collect();
    json!({"_scroll_id": scroll_id, "hits": {"total": total, "hits": hits}}).to_string()
}

#[tokio::test]
async fn cursor_terminates_after_the_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/logs/_search"))
        .and(query_param("scroll", "5m"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("s1", 3, &["1", "2"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_search/scroll"))
        .and(query_param("scroll_id", "s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("s2", 3, &["3"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_search/scroll"))
        .and(query_param("scroll_id", "s2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("s3", 3, &[])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let mut cursor = client.scroll("logs", None, None);

    let first = cursor.next_page().await.expect("page 1").expect("has docs");
    assert_eq!(first.get_current_size(), 2);
    let second = cursor.next_page().await.expect("page 2").expect("has docs");
    assert_eq!(second.get_current_size(), 1);

    // The third fetch returns no hits: the cursor is exhausted.
    assert!(cursor.next_page().await.expect("page 3").is_none());
    assert!(cursor.is_exhausted());
    assert_eq!(cursor.progress(), (3, 3));

    // Exhausted cursors answer locally; the mocks' expectations hold.
    assert!(cursor.next_page().await.expect("no further fetch").is_none());
}

#[tokio::test]
async fn scroll_start_passes_type_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/logs/event/_search"))
        .and(query_param("scroll", "5m"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("s1", 1, &["1"])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let query = json!({"query": {"term": {"n": "1"}}});
    let first = client
        .scroll_start("logs", Some("event"), Some(&query))
        .await
        .expect("opened");
    assert_eq!(first.get_scroll_id(), "s1");

    let requests = server.received_requests().await.expect("recording enabled");
    let body = String::from_utf8(requests[0].body.clone()).expect("utf8");
    assert!(body.contains("term"));
}

#[tokio::test]
async fn drain_writes_one_line_per_mapped_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/logs/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("s1", 2, &["1", "2"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_search/scroll"))
        .and(query_param("scroll_id", "s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("s2", 2, &[])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let cursor = client.scroll("logs", None, None);

    let mut out: Vec<u8> = Vec::new();
    let written = cursor
        .drain_to(&mut out, |doc| Some(format!("{},{}", doc.get_id(), doc.get_index_name())))
        .await
        .expect("drained");

    assert_eq!(written, 2);
    assert_eq!(String::from_utf8(out).expect("utf8"), "1,logs\n2,logs\n");
}

#[tokio::test]
async fn scroll_start_requires_an_index() {
    let client = client_for("http://localhost:1");
    assert!(client.scroll_start(" ", None, None).await.is_err());
}
