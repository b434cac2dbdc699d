use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use tracing::{error, warn};

use crate::conf::Endpoint;
use crate::error::{EsError, EsResult};
use crate::retry::{FailureKind, RetryPolicy};
use crate::transport::TransportPool;

/// Raw HTTP exchange result. Callers interpret the status themselves.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    body: String,
}

impl HttpResponse {
    pub fn status(&self) -> u16 {
        self.status
    }
    pub fn body(&self) -> &str {
        &self.body
    }
    pub fn into_body(self) -> String {
        self.body
    }
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Builds and sends single HTTP requests for one endpoint, holding a pool
/// slot for the duration of the exchange and replaying failed attempts per
/// the retry policy. A logical operation keeps its permits across retries.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    pool: Arc<TransportPool>,
    endpoint: Endpoint,
    retry: RetryPolicy,
}

fn inject_auth(request_builder: RequestBuilder, endpoint: &Endpoint) -> RequestBuilder {
    if endpoint.has_basic_auth() {
        request_builder.basic_auth(endpoint.get_username(), endpoint.get_password())
    } else {
        request_builder
    }
}

impl RequestExecutor {
    pub fn new(pool: Arc<TransportPool>, endpoint: Endpoint, retry: RetryPolicy) -> Self {
        pool.register_route(endpoint.get_url());
        Self {
            pool,
            endpoint,
            retry,
        }
    }

    pub fn get_retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn get(&self, url: &str) -> EsResult<HttpResponse> {
        self.request(Method::GET, url, None, None, &self.retry).await
    }

    pub async fn post(&self, url: &str, body: String) -> EsResult<HttpResponse> {
        self.request(Method::POST, url, Some(body), None, &self.retry)
            .await
    }

    pub async fn put(&self, url: &str, body: String) -> EsResult<HttpResponse> {
        self.request(Method::PUT, url, Some(body), None, &self.retry)
            .await
    }

    /// Single-attempt GET for the admin paths that must not retry.
    pub async fn get_once(&self, url: &str) -> EsResult<HttpResponse> {
        self.request(Method::GET, url, None, None, &RetryPolicy::none())
            .await
    }

    /// Single-attempt PUT for the admin paths that must not retry.
    pub async fn put_once(&self, url: &str, body: String) -> EsResult<HttpResponse> {
        self.request(Method::PUT, url, Some(body), None, &RetryPolicy::none())
            .await
    }

    /// Full-control entry point: optional body, optional per-call total
    /// timeout override, explicit retry policy.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        timeout: Option<Duration>,
        policy: &RetryPolicy,
    ) -> EsResult<HttpResponse> {
        // An empty body is sent as no entity at all, and such a request is
        // treated as idempotent by the classifier.
        let body = body.filter(|b| !b.is_empty());
        let has_body = body.is_some();

        let _permit = self.pool.acquire(self.endpoint.get_url()).await?;

        let mut delays = policy.delays();
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match self.send(method.clone(), url, body.as_deref(), timeout).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let kind = FailureKind::classify(&err);
                    if !policy.should_retry(kind, attempts, has_body) {
                        error!(
                            "request failed on {}: {} (kind {:?}, {} attempt(s))",
                            url, err, kind, attempts
                        );
                        return Err(EsError::Transport { kind, source: err });
                    }
                    warn!(
                        "retrying {} after {:?} (attempt {}/{})",
                        url,
                        kind,
                        attempts,
                        policy.get_max_attempts()
                    );
                    if let Some(delay) = delays.next() {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut request_builder = self.pool.http_client().request(method, url);
        request_builder = inject_auth(request_builder, &self.endpoint);
        if let Some(timeout) = timeout {
            request_builder = request_builder.timeout(timeout);
        }
        if let Some(body) = body {
            request_builder = request_builder.body(body.to_owned());
        }

        let response = request_builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}
