use dataputter_core::{PutterError, Result, DELETE_TOKEN_LEN};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub write_node: WriteNodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_redis_hostport")]
    pub hostport: String,
}

impl MetadataConfig {
    pub fn url(&self) -> String {
        format!("redis://{}", self.hostport)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_ingest_bind")]
    pub ingest_bind: String,
    #[serde(default = "default_object_read_bind")]
    pub object_read_bind: String,
    #[serde(default = "default_ticket_read_bind")]
    pub ticket_read_bind: String,
    /// Write node addresses, dispatched to round-robin per ingest.
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,
    #[serde(default = "default_delete_token")]
    pub delete_token: String,
    #[serde(default = "default_barrier_timeout_secs")]
    pub barrier_timeout_secs: u64,
}

impl RouterConfig {
    pub fn delete_token_bytes(&self) -> Result<[u8; DELETE_TOKEN_LEN]> {
        <[u8; DELETE_TOKEN_LEN]>::try_from(self.delete_token.as_bytes()).map_err(|_| {
            PutterError::Config(format!(
                "delete token must be exactly {} bytes",
                DELETE_TOKEN_LEN
            ))
        })
    }

    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_secs(self.barrier_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteNodeConfig {
    #[serde(default = "default_write_node_bind")]
    pub bind_addr: String,
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Identity reported in write responses; defaults to the bind address.
    #[serde(default)]
    pub node_id: Option<String>,
}

impl WriteNodeConfig {
    pub fn node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| self.bind_addr.clone())
    }
}

fn default_redis_hostport() -> String {
    "localhost:6379".to_string()
}

fn default_ingest_bind() -> String {
    "127.0.0.1:5001".to_string()
}

fn default_object_read_bind() -> String {
    "127.0.0.1:5004".to_string()
}

fn default_ticket_read_bind() -> String {
    "127.0.0.1:5005".to_string()
}

fn default_nodes() -> Vec<String> {
    vec!["127.0.0.1:5002".to_string()]
}

fn default_delete_token() -> String {
    String::from_utf8_lossy(&dataputter_core::DEFAULT_AUTHENTICITY_TOKEN).to_string()
}

fn default_barrier_timeout_secs() -> u64 {
    30
}

fn default_write_node_bind() -> String {
    "127.0.0.1:5002".to_string()
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            hostport: default_redis_hostport(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            ingest_bind: default_ingest_bind(),
            object_read_bind: default_object_read_bind(),
            ticket_read_bind: default_ticket_read_bind(),
            nodes: default_nodes(),
            delete_token: default_delete_token(),
            barrier_timeout_secs: default_barrier_timeout_secs(),
        }
    }
}

impl Default for WriteNodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_write_node_bind(),
            data_root: default_data_root(),
            node_id: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metadata: MetadataConfig::default(),
            router: RouterConfig::default(),
            write_node: WriteNodeConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from an optional file plus `DATAPUTTER`-prefixed
    /// environment variables. `REDIS_HOSTPORT` overrides the metadata
    /// endpoint last.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path));
        }
        let settings = builder
            .add_source(::config::Environment::with_prefix("DATAPUTTER"))
            .build()
            .map_err(|e| PutterError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| PutterError::Config(e.to_string()))?;

        if let Ok(hostport) = std::env::var("REDIS_HOSTPORT") {
            if !hostport.is_empty() {
                config.metadata.hostport = hostport;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.metadata.hostport, "localhost:6379");
        assert_eq!(config.metadata.url(), "redis://localhost:6379");
        assert_eq!(config.router.ingest_bind, "127.0.0.1:5001");
        assert_eq!(config.router.object_read_bind, "127.0.0.1:5004");
        assert_eq!(config.router.ticket_read_bind, "127.0.0.1:5005");
        assert_eq!(config.router.nodes, vec!["127.0.0.1:5002".to_string()]);
        assert_eq!(config.write_node.bind_addr, "127.0.0.1:5002");
        assert_eq!(config.write_node.data_root, PathBuf::from("data"));
        assert_eq!(config.write_node.node_id(), "127.0.0.1:5002");
    }

    #[test]
    fn test_default_delete_token_is_sixteen_bytes() {
        let config = RouterConfig::default();
        let token = config.delete_token_bytes().unwrap();
        assert_eq!(token, dataputter_core::DEFAULT_AUTHENTICITY_TOKEN);
    }

    #[test]
    fn test_short_delete_token_is_rejected() {
        let config = RouterConfig {
            delete_token: "tooshort".to_string(),
            ..RouterConfig::default()
        };
        assert!(config.delete_token_bytes().is_err());
    }
}
