use std::time::Duration;

use twelf::config;
use twelf::reexports::serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Top-level configuration: the endpoints this process talks to plus the
/// shared client tuning. Loadable from toml/json layers via `with_layers`,
/// or assembled programmatically through [`Config::new`].
#[config]
#[derive(Debug, Default)]
pub struct Config {
    endpoints: Vec<Endpoint>,
    #[serde(default)]
    client: ClientConf,
}

impl Config {
    pub fn new(endpoints: Vec<Endpoint>, client: ClientConf) -> Self {
        Self { endpoints, client }
    }
    pub fn get_endpoints(&self) -> &Vec<Endpoint> {
        &self.endpoints
    }
    pub fn get_client(&self) -> &ClientConf {
        &self.client
    }
    pub fn find_endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.get_name() == name)
    }
}

/// Protocol generation of the remote engine. The two supported generations
/// differ only in minor request-format details (scripted-update language
/// defaults, `hits.total` shape).
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EsVersion {
    Es2,
    #[default]
    Es5,
}

impl EsVersion {
    /// Server-side scripting language assumed when the caller names none.
    pub fn default_script_lang(&self) -> &'static str {
        match self {
            EsVersion::Es2 => "groovy",
            EsVersion::Es5 => "painless",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Endpoint {
    name: String,
    url: String,
    #[serde(default)]
    version: EsVersion,
    #[serde(default)]
    basic_auth: Option<BasicAuth>,
    #[serde(default)]
    root_certificates: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BasicAuth {
    username: String,
    #[serde(default)]
    password: Option<String>,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
    pub fn get_username(&self) -> &String {
        &self.username
    }
    pub fn get_password(&self) -> &Option<String> {
        &self.password
    }
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>, version: EsVersion) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            version,
            basic_auth: None,
            root_certificates: Vec::new(),
        }
    }

    pub fn with_basic_auth(mut self, auth: BasicAuth) -> Self {
        self.basic_auth = Some(auth);
        self
    }

    pub fn with_root_certificates(mut self, paths: Vec<String>) -> Self {
        self.root_certificates = paths;
        self
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }

    /// Endpoint URL without a trailing slash, ready for path composition.
    pub fn get_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn get_version(&self) -> EsVersion {
        self.version
    }

    pub fn get_root_certificates(&self) -> &Vec<String> {
        &self.root_certificates
    }

    pub fn has_basic_auth(&self) -> bool {
        self.basic_auth.is_some()
    }

    pub fn get_username(&self) -> String {
        if let Some(basic_auth) = &self.basic_auth {
            basic_auth.get_username().clone()
        } else {
            String::default()
        }
    }

    pub fn get_password(&self) -> Option<String> {
        if let Some(basic_auth) = &self.basic_auth {
            return basic_auth.get_password().clone();
        }
        None
    }
}

/// Shared transport and write-path tuning. Every numeric default mirrors the
/// values the layer shipped with for years; all are overridable per install.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClientConf {
    #[serde(default = "default_max_connections")]
    max_connections: usize,
    #[serde(default = "default_max_connections")]
    max_connections_per_route: usize,
    #[serde(default = "default_timeout_secs")]
    connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    read_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default)]
    retry_backoff_ms: u64,
    #[serde(default = "default_flush_interval_ms")]
    flush_interval_ms: u64,
}

fn default_max_connections() -> usize {
    50
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    5
}

fn default_flush_interval_ms() -> u64 {
    1000
}

impl Default for ClientConf {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_connections_per_route: default_max_connections(),
            connect_timeout_secs: default_timeout_secs(),
            read_timeout_secs: default_timeout_secs(),
            request_timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: 0,
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl ClientConf {
    pub fn get_max_connections(&self) -> usize {
        self.max_connections
    }
    pub fn get_max_connections_per_route(&self) -> usize {
        self.max_connections_per_route
    }
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn with_max_connections(mut self, total: usize, per_route: usize) -> Self {
        self.max_connections = total;
        self.max_connections_per_route = per_route;
        self
    }
    pub fn with_timeouts(mut self, connect: u64, read: u64, request: u64) -> Self {
        self.connect_timeout_secs = connect;
        self.read_timeout_secs = read;
        self.request_timeout_secs = request;
        self
    }
    pub fn with_retry(mut self, max_attempts: u32, backoff_ms: u64) -> Self {
        self.max_attempts = max_attempts;
        self.retry_backoff_ms = backoff_ms;
        self
    }
    pub fn with_flush_interval_ms(mut self, millis: u64) -> Self {
        self.flush_interval_ms = millis;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_shipped_tuning() {
        let conf = ClientConf::default();
        assert_eq!(conf.get_max_connections(), 50);
        assert_eq!(conf.get_max_connections_per_route(), 50);
        assert_eq!(conf.connect_timeout(), Duration::from_secs(120));
        assert_eq!(conf.request_timeout(), Duration::from_secs(120));
        assert_eq!(conf.retry_policy().get_max_attempts(), 5);
        assert_eq!(conf.flush_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn endpoint_url_is_normalized_for_path_composition() {
        let endpoint = Endpoint::new("local", "http://localhost:9200/", EsVersion::Es5);
        assert_eq!(endpoint.get_url(), "http://localhost:9200");
    }

    #[test]
    fn script_lang_defaults_follow_the_generation() {
        assert_eq!(EsVersion::Es2.default_script_lang(), "groovy");
        assert_eq!(EsVersion::Es5.default_script_lang(), "painless");
    }
}
