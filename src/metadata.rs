use std::{fmt, str::FromStr};

use crate::{
    config::{MetadataConfig, RetryConfig},
    errors::{Error, Result},
};
use reqwest::ClientBuilder;
use tokio::time::{sleep, Duration};

/// Defines the cluster role of the host machine.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Role {
    Master,
    Worker,
    Unknown(String),
}

impl std::convert::From<&str> for Role {
    fn from(s: &str) -> Self {
        match s.trim() {
            "Master" => Role::Master,
            "Worker" => Role::Worker,
            other => Role::Unknown(other.to_owned()),
        }
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Role::from(s))
    }
}

impl Role {
    /// Returns the `&str` value of the enum member.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Master => "Master",
            Role::Worker => "Worker",
            Role::Unknown(s) => s.as_ref(),
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, Role::Master)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fetches the role of the host machine from the instance metadata server,
/// retrying transient failures.
/// ref. https://cloud.google.com/compute/docs/metadata/querying-metadata
/// e.g., curl -H "Metadata-Flavor: Google" http://metadata.google.internal/computeMetadata/v1/instance/attributes/dataproc-role
pub async fn fetch_role(cfg: &MetadataConfig, retry: &RetryConfig) -> Result<Role> {
    let attempts = retry.attempts.max(1);
    let mut round: u32 = 0;
    loop {
        match fetch_metadata(cfg).await {
            Ok(text) => {
                let role = Role::from(text.as_str());
                log::info!("resolved node role '{}'", role);
                return Ok(role);
            }
            Err(e) => {
                round += 1;
                if !e.retryable() || round >= attempts {
                    return Err(e);
                }
                log::warn!("[ROUND {round}] retriable metadata error '{}'", e);
                sleep(Duration::from_secs(retry.interval_secs * u64::from(round))).await;
            }
        }
    }
}

/// Fetches one metadata value from the configured endpoint.
pub async fn fetch_metadata(cfg: &MetadataConfig) -> Result<String> {
    log::info!("fetching metadata '{}'", cfg.endpoint);

    let cli = ClientBuilder::new()
        .user_agent(env!("CARGO_PKG_NAME"))
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .no_proxy()
        .build()
        .map_err(|e| Error::Metadata {
            message: format!("failed ClientBuilder build {:?}", e),
            retryable: false,
        })?;
    let resp = cli
        .get(&cfg.endpoint)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| Error::Metadata {
            message: format!("failed GET '{}' {:?}", cfg.endpoint, e),
            retryable: e.is_timeout() || e.is_connect(),
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Metadata {
            message: format!("GET '{}' returned status {}", cfg.endpoint, status),
            retryable: status.is_server_error(),
        });
    }

    let out = resp.bytes().await.map_err(|e| Error::Metadata {
        message: format!("failed to read bytes {:?}", e),
        retryable: false,
    })?;
    let out: Vec<u8> = out.into();

    match String::from_utf8(out) {
        Ok(text) => Ok(text),
        Err(e) => Err(Error::Metadata {
            message: format!("GET '{}' failed String::from_utf8 ({})", cfg.endpoint, e),
            retryable: false,
        }),
    }
}

/// RUST_LOG=debug cargo test --package notebook-init --lib -- metadata::test_role --exact --show-output
#[test]
fn test_role() {
    assert_eq!(Role::from("Master"), Role::Master);
    assert_eq!(Role::from("Master\n"), Role::Master);
    assert_eq!(Role::from("Worker"), Role::Worker);
    assert_eq!(Role::from("master"), Role::Unknown("master".to_string()));
    assert!(Role::Master.is_master());
    assert!(!Role::Worker.is_master());
    assert!(!Role::from("").is_master());
    assert_eq!(Role::Worker.to_string(), "Worker");
}
