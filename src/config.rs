use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3030";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Execution node endpoint used when a request does not name one
    pub rpc_url: String,
    /// Address the JSON-RPC server listens on
    pub bind_addr: SocketAddr,
    /// Upper bound on each node request, in seconds
    pub rpc_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            rpc_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// `ETH_RPC_URL`, `INSPECTOR_BIND_ADDR` and `INSPECTOR_RPC_TIMEOUT_SECS`
    /// override the defaults.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let defaults = Self::default();
        let rpc_url = lookup("ETH_RPC_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.rpc_url);
        let bind_addr = match lookup("INSPECTOR_BIND_ADDR") {
            Some(addr) => addr.parse()?,
            None => defaults.bind_addr,
        };
        let rpc_timeout_secs = match lookup("INSPECTOR_RPC_TIMEOUT_SECS") {
            Some(secs) => secs.parse()?,
            None => defaults.rpc_timeout_secs,
        };

        Ok(Self {
            rpc_url,
            bind_addr,
            rpc_timeout_secs,
        })
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}
