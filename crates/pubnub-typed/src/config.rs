use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub(crate) const DEFAULT_ORIGIN: &str = "pubsub.pubnub.com";
pub(crate) const DEFAULT_SUBSCRIBE_TIMEOUT_SECS: u32 = 310;
pub(crate) const DEFAULT_NON_SUBSCRIBE_TIMEOUT_SECS: u32 = 15;
pub(crate) const DEFAULT_HEARTBEAT_INTERVAL_SECS: u32 = 10;
pub(crate) const DEFAULT_NETWORK_CHECK_MAX_RETRIES: u32 = 50;

/// Session tunables held by the transport engine.
///
/// The facade only reads and forwards these; they take effect inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    pub auth_key: Option<String>,
    pub session_uuid: Option<String>,
    pub origin: String,
    pub ssl: bool,
    pub subscribe_timeout_secs: u32,
    pub non_subscribe_timeout_secs: u32,
    pub network_check_retry_interval_secs: u32,
    pub network_check_max_retries: u32,
    pub local_client_heartbeat_interval_secs: u32,
    /// Presence timeout announced to the service; 0 disables presence heartbeats.
    pub presence_heartbeat_secs: u32,
    pub presence_heartbeat_interval_secs: u32,
    pub enable_resume_on_reconnect: bool,
    pub enable_json_encoding_for_publish: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auth_key: None,
            session_uuid: None,
            origin: DEFAULT_ORIGIN.to_string(),
            ssl: false,
            subscribe_timeout_secs: DEFAULT_SUBSCRIBE_TIMEOUT_SECS,
            non_subscribe_timeout_secs: DEFAULT_NON_SUBSCRIBE_TIMEOUT_SECS,
            network_check_retry_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            network_check_max_retries: DEFAULT_NETWORK_CHECK_MAX_RETRIES,
            local_client_heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            presence_heartbeat_secs: 0,
            presence_heartbeat_interval_secs: 0,
            enable_resume_on_reconnect: true,
            enable_json_encoding_for_publish: true,
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.origin.trim().is_empty() {
            return Err(Error::Config("origin must not be empty".into()));
        }
        if self.subscribe_timeout_secs == 0 {
            return Err(Error::Config("subscribe_timeout_secs must be > 0".into()));
        }
        if self.non_subscribe_timeout_secs == 0 {
            return Err(Error::Config(
                "non_subscribe_timeout_secs must be > 0".into(),
            ));
        }
        if self.presence_heartbeat_secs > 0
            && self.presence_heartbeat_interval_secs >= self.presence_heartbeat_secs
        {
            return Err(Error::Config(format!(
                "presence_heartbeat_interval_secs ({}) must be below presence_heartbeat_secs ({})",
                self.presence_heartbeat_interval_secs, self.presence_heartbeat_secs
            )));
        }
        Ok(())
    }
}

/// Keys and session settings for one client, usually loaded from YAML.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub publish_key: String,
    pub subscribe_key: String,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub cipher_key: Option<String>,
    #[serde(default)]
    pub session: SessionSettings,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ClientConfig")
            .field("publish_key", &self.publish_key)
            .field("subscribe_key", &self.subscribe_key)
            .field("secret_key", &redact(&self.secret_key))
            .field("cipher_key", &redact(&self.cipher_key))
            .field("session", &self.session)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(publish_key: impl Into<String>, subscribe_key: impl Into<String>) -> Self {
        Self {
            publish_key: publish_key.into(),
            subscribe_key: subscribe_key.into(),
            secret_key: None,
            cipher_key: None,
            session: SessionSettings::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.subscribe_key.trim().is_empty() {
            return Err(Error::Config("subscribe_key must not be empty".into()));
        }
        self.session.validate()
    }

    /// Parse and validate a config from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml_ng::from_str(content).map_err(parse_error)?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_error(e: serde_yaml_ng::Error) -> Error {
    Error::Config(format!("parse: {e}"))
}

/// Load and validate a client config from a YAML file.
pub async fn load(path: &Path) -> Result<ClientConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
    ClientConfig::from_yaml(&content).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}
