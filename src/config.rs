use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "UPDATE_DNS_CONFIG";

/// Which entry wins when several records in the zone share the configured
/// name and type.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    First,
    #[default]
    Last,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UDConfig {
    /// Base URL of the provider API, without the `/v2` prefix.
    pub url: String,
    pub token: String,
    pub zone: String,
    pub record_name: String,
    /// Fully qualified name resolved to decide whether an update is needed.
    pub domain: String,
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default)]
    pub match_policy: MatchPolicy,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

impl UDConfig {
    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let buf = fs::read(path)?;

        let res = serde_json::from_slice(&buf)?;

        Ok(res)
    }

    pub fn default_path() -> anyhow::Result<PathBuf> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(std::env::current_dir()?.join("config.json")),
        }
    }
}
