use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Certificate, Client};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::conf::{ClientConf, Endpoint};
use crate::error::{EsError, EsResult};

/// Shared transport: one reqwest client plus the concurrency gates.
///
/// The reqwest client reuses connections on its own; the semaphores bound
/// how many requests may be in flight at once, in total and per route, so a
/// burst of callers queues instead of opening unbounded sockets. Routes are
/// registered when a client for a new endpoint is constructed, not per call.
/// There is no close operation; the pool lives as long as the process.
#[derive(Debug)]
pub struct TransportPool {
    http_client: Client,
    per_route: usize,
    total: Arc<Semaphore>,
    routes: RwLock<HashMap<String, Arc<Semaphore>>>,
}

/// In-flight slot. Dropping it releases both the global and the route gate.
#[derive(Debug)]
pub struct TransportPermit {
    _total: OwnedSemaphorePermit,
    _route: OwnedSemaphorePermit,
}

impl TransportPool {
    /// Build the shared reqwest client and size the gates from `conf`.
    /// Root certificates named by the endpoints are loaded once, up front.
    pub fn new(conf: &ClientConf, endpoints: &[Endpoint]) -> EsResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(conf.connect_timeout())
            .read_timeout(conf.read_timeout())
            .timeout(conf.request_timeout());

        for endpoint in endpoints {
            for cert in load_certificates(endpoint.get_root_certificates())? {
                builder = builder.add_root_certificate(cert);
            }
        }

        let http_client = builder
            .build()
            .map_err(|e| EsError::Validation(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http_client,
            per_route: conf.get_max_connections_per_route(),
            total: Arc::new(Semaphore::new(conf.get_max_connections())),
            routes: RwLock::new(HashMap::new()),
        })
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Register a route-specific gate sized at the per-route cap. Called by
    /// client construction; registering the same route twice is a no-op.
    pub fn register_route(&self, route: &str) {
        let mut routes = self
            .routes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        routes
            .entry(route.to_string())
            .or_insert_with(|| {
                debug!("registering transport route {} (cap {})", route, self.per_route);
                Arc::new(Semaphore::new(self.per_route))
            });
    }

    /// Wait for a free slot on the global and route gates.
    pub async fn acquire(&self, route: &str) -> EsResult<TransportPermit> {
        let total = Arc::clone(&self.total)
            .acquire_owned()
            .await
            .map_err(|_| EsError::PoolClosed)?;

        let route_gate = {
            let routes = self
                .routes
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            routes.get(route).cloned()
        };
        let route_gate = match route_gate {
            Some(gate) => gate,
            None => {
                // Unregistered route, e.g. an executor built around a raw
                // URL. Register lazily with the same cap.
                self.register_route(route);
                let routes = self
                    .routes
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                routes
                    .get(route)
                    .cloned()
                    .ok_or(EsError::PoolClosed)?
            }
        };

        let route_permit = route_gate
            .acquire_owned()
            .await
            .map_err(|_| EsError::PoolClosed)?;

        Ok(TransportPermit {
            _total: total,
            _route: route_permit,
        })
    }

    /// Free slots on the global gate, mostly useful in tests and metrics.
    pub fn available(&self) -> usize {
        self.total.available_permits()
    }
}

fn load_certificates(paths: &[String]) -> EsResult<Vec<Certificate>> {
    let mut certs = Vec::new();
    for path in paths {
        let content = std::fs::read(path)?;
        let cert = Certificate::from_pem(&content)
            .map_err(|e| EsError::Validation(format!("invalid certificate {path}: {e}")))?;
        certs.push(cert);
    }
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::EsVersion;

    #[tokio::test]
    async fn permits_are_returned_on_drop() {
        let conf = ClientConf::default().with_max_connections(2, 2);
        let pool = TransportPool::new(&conf, &[]).unwrap();
        pool.register_route("http://localhost:9200");

        let first = pool.acquire("http://localhost:9200").await.unwrap();
        let second = pool.acquire("http://localhost:9200").await.unwrap();
        assert_eq!(pool.available(), 0);

        drop(first);
        drop(second);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn callers_over_the_cap_wait_for_a_slot() {
        let conf = ClientConf::default().with_max_connections(1, 1);
        let pool = Arc::new(TransportPool::new(&conf, &[]).unwrap());
        pool.register_route("r");

        let held = pool.acquire("r").await.unwrap();
        let contender = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire("r").await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(held);
        contender.await.unwrap().unwrap();
    }

    #[test]
    fn endpoint_certificates_must_exist() {
        let endpoint = Endpoint::new("e", "http://h", EsVersion::Es5)
            .with_root_certificates(vec!["/nonexistent/ca.pem".to_string()]);
        let conf = ClientConf::default();
        assert!(TransportPool::new(&conf, &[endpoint]).is_err());
    }
}
