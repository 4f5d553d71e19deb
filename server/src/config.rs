//! Server settings read from the environment

use jobquest_networking::LlmConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DATA_DIR_NAME: &str = "JobQuest";
const DB_FILE_NAME: &str = "jobquest.db";

/// Seconds between sweeps of idle sessions and rate-limit entries
const DEFAULT_SWEEP_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub llm: LlmConfig,
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = lookup("JOBQUEST_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("invalid JOBQUEST_BIND: {}", e))?;

        let db_path = lookup("JOBQUEST_DB")
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let mut llm = LlmConfig::default();
        if let Some(base_url) = lookup("LLM_BASE_URL") {
            llm.base_url = base_url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            llm.model = model;
        }
        if let Some(api_key) = lookup("LLM_API_KEY") {
            llm.api_key = api_key;
        }
        if let Some(timeout) = lookup("LLM_TIMEOUT_SECS") {
            llm.timeout_secs = timeout
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid LLM_TIMEOUT_SECS: {}", e))?;
        }

        let sweep_interval_secs = match lookup("JOBQUEST_SWEEP_SECS") {
            Some(value) => value
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid JOBQUEST_SWEEP_SECS: {}", e))?,
            None => DEFAULT_SWEEP_SECS,
        };
        // The sweeper's interval timer cannot tick every 0 seconds
        if sweep_interval_secs == 0 {
            anyhow::bail!("JOBQUEST_SWEEP_SECS must be at least 1");
        }

        Ok(Self {
            bind,
            db_path,
            llm,
            sweep_interval_secs,
        })
    }
}

fn default_db_path() -> PathBuf {
    dirs_next::data_local_dir()
        .map(|p| p.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DB_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert!(config.db_path.ends_with(DB_FILE_NAME));
        assert_eq!(config.llm.timeout_secs, 30);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("JOBQUEST_BIND", "0.0.0.0:9000"),
            ("JOBQUEST_DB", "/tmp/jq.db"),
            ("LLM_MODEL", "llama3"),
            ("LLM_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.db_path, PathBuf::from("/tmp/jq.db"));
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.timeout_secs, 5);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(ServerConfig::from_lookup(lookup(&[("JOBQUEST_BIND", "nope")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("LLM_TIMEOUT_SECS", "soon")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("JOBQUEST_SWEEP_SECS", "-1")])).is_err());

        let zero = ServerConfig::from_lookup(lookup(&[("JOBQUEST_SWEEP_SECS", "0")])).unwrap_err();
        assert!(zero.to_string().contains("at least 1"));
        let one = ServerConfig::from_lookup(lookup(&[("JOBQUEST_SWEEP_SECS", "1")])).unwrap();
        assert_eq!(one.sweep_interval_secs, 1);
    }
}
