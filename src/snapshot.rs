use serde_json::{json, Value};
use tracing::warn;

use crate::error::{EsError, EsResult};
use crate::es_client::EsClient;

/// Backend settings for an object-storage snapshot repository.
///
/// The key set is a fixed allow-list; only populated keys are sent. The
/// bucket is the one required field and is validated up front, before any
/// request is composed.
#[derive(Debug, Clone)]
pub struct RepositoryConf {
    bucket: String,
    region: Option<String>,
    endpoint: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
}

impl RepositoryConf {
    pub fn new(bucket: impl Into<String>) -> EsResult<Self> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            return Err(EsError::Validation(
                "repository bucket must not be empty".to_string(),
            ));
        }
        Ok(Self {
            bucket,
            region: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
        })
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn get_bucket(&self) -> &String {
        &self.bucket
    }

    pub(crate) fn to_settings(&self) -> Value {
        let mut settings = json!({ "bucket": self.bucket });
        if let Some(region) = &self.region {
            settings["region"] = json!(region);
        }
        if let Some(endpoint) = &self.endpoint {
            settings["endpoint"] = json!(endpoint);
        }
        if let Some(access_key) = &self.access_key {
            settings["access_key"] = json!(access_key);
        }
        if let Some(secret_key) = &self.secret_key {
            settings["secret_key"] = json!(secret_key);
        }
        settings
    }
}

/// Snapshot and repository lifecycle. Thin single-attempt PUT/GET calls:
/// no retries, boolean surface, failures logged.
impl EsClient {
    pub async fn create_s3_repository(&self, repo: &str, conf: &RepositoryConf) -> bool {
        let url = format!("{}/_snapshot/{}", self.base(), repo);
        let body = json!({ "type": "s3", "settings": conf.to_settings() }).to_string();
        match self.executor().put_once(&url, body).await {
            Ok(response) if response.status() == 200 => true,
            Ok(response) => {
                warn!("create repository {} failed: {}", repo, response.body());
                false
            }
            Err(e) => {
                warn!("create repository {} failed: {}", repo, e);
                false
            }
        }
    }

    pub async fn check_repository_exist(&self, repo: &str) -> bool {
        let url = format!("{}/_snapshot/{}", self.base(), repo);
        match self.executor().get_once(&url).await {
            Ok(response) => response.status() == 200,
            Err(e) => {
                warn!("repository existence check failed on {}: {}", url, e);
                false
            }
        }
    }

    pub async fn create_snapshot(&self, repo: &str, snapshot: &str, config: &Value) -> bool {
        let url = format!("{}/_snapshot/{}/{}", self.base(), repo, snapshot);
        match self.executor().put_once(&url, config.to_string()).await {
            Ok(response) if response.status() == 200 => true,
            Ok(response) => {
                warn!(
                    "create snapshot {}/{} failed: {}",
                    repo,
                    snapshot,
                    response.body()
                );
                false
            }
            Err(e) => {
                warn!("create snapshot {}/{} failed: {}", repo, snapshot, e);
                false
            }
        }
    }

    pub async fn restore_snapshot(&self, repo: &str, snapshot: &str, config: &Value) -> bool {
        let url = format!("{}/_snapshot/{}/{}/_restore", self.base(), repo, snapshot);
        match self.executor().put_once(&url, config.to_string()).await {
            Ok(response) if response.status() == 200 => true,
            Ok(response) => {
                warn!(
                    "restore snapshot {}/{} failed: {}",
                    repo,
                    snapshot,
                    response.body()
                );
                false
            }
            Err(e) => {
                warn!("restore snapshot {}/{} failed: {}", repo, snapshot, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_required() {
        assert!(RepositoryConf::new("  ").is_err());
        assert!(RepositoryConf::new("backups").is_ok());
    }

    #[test]
    fn only_populated_keys_are_serialized() {
        let conf = RepositoryConf::new("backups")
            .unwrap()
            .with_region("eu-central-1");
        let settings = conf.to_settings();
        assert_eq!(settings["bucket"], "backups");
        assert_eq!(settings["region"], "eu-central-1");
        assert!(settings.get("endpoint").is_none());
        assert!(settings.get("access_key").is_none());
        assert!(settings.get("secret_key").is_none());
    }

    #[test]
    fn credentials_travel_together() {
        let settings = RepositoryConf::new("b")
            .unwrap()
            .with_credentials("AKIA", "s3cr3t")
            .to_settings();
        assert_eq!(settings["access_key"], "AKIA");
        assert_eq!(settings["secret_key"], "s3cr3t");
    }
}
