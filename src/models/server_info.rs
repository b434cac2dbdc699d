use semver::Version as Semver;
use serde::{Deserialize, Serialize};

use crate::conf::EsVersion;
use crate::error::{EsError, EsResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerInfo {
    #[serde(rename = "name")]
    hostname: String,
    #[serde(rename = "cluster_name")]
    name: String,
    #[serde(rename = "cluster_uuid")]
    uuid: Option<String>,
    version: Version,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Version {
    number: String,
    #[serde(default)]
    lucene_version: Option<String>,
}

impl ServerInfo {
    pub fn get_hostname(&self) -> &String {
        &self.hostname
    }
    pub fn get_name(&self) -> &String {
        &self.name
    }
    pub fn get_uuid(&self) -> &Option<String> {
        &self.uuid
    }
    pub fn get_version(&self) -> &String {
        &self.version.number
    }
    pub fn get_lucene_version(&self) -> Option<&String> {
        self.version.lucene_version.as_ref()
    }

    pub fn get_version_major(&self) -> EsResult<u64> {
        let version = Semver::parse(&self.version.number)
            .map_err(|e| EsError::Parse(format!("unparseable server version: {e}")))?;
        Ok(version.major)
    }

    /// Whether the server's reported major matches the configured
    /// generation tag. Majors above the tag are accepted; the wire format
    /// the tag selects stays understood by newer servers.
    pub fn matches_generation(&self, version: EsVersion) -> bool {
        match self.get_version_major() {
            Ok(major) => match version {
                EsVersion::Es2 => major == 2,
                EsVersion::Es5 => major >= 5,
            },
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_root_endpoint_body() {
        let body = r#"{
            "name": "node-1",
            "cluster_name": "prod",
            "cluster_uuid": "u-123",
            "version": {"number": "5.6.16", "lucene_version": "6.6.1"}
        }"#;
        let info: ServerInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.get_hostname(), "node-1");
        assert_eq!(info.get_version_major().unwrap(), 5);
        assert!(info.matches_generation(EsVersion::Es5));
        assert!(!info.matches_generation(EsVersion::Es2));
    }
}
