pub mod aws;
pub mod log_level;

use std::ffi::OsString;
use std::path::Path;

use figment::providers::{Format, Yaml};
use figment::{Figment, providers::Env};
use serde::{Deserialize, Deserializer};
use serde_aux::field_attributes::deserialize_bool_from_anything;
use serde_json::Value;

use crate::config::log_level::LogLevel;
use crate::logs::attributes::{self, AttributeEncoding, ServerAttribute};

pub const DEFAULT_PARSER_NAME: &str = "cloudWatchLogs";
pub const DEFAULT_INGEST_URL: &str = "https://www.scalyr.com";
pub const CONFIG_FILE_NAME: &str = "forwarder.yaml";

/// Environment variables read into [`Config`]. `SERVER_*` variables are collected separately.
const CONFIG_ENV_KEYS: [&str; 9] = [
    "API_KEY",
    "KMS_API_KEY",
    "PARSER_NAME",
    "USE_ADD_EVENTS_API",
    "INGEST_URL",
    "LOG_LEVEL",
    "REQUEST_TIMEOUT",
    "HTTPS_PROXY",
    "ATTRIBUTE_ENCODING",
];

#[derive(Debug, PartialEq, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Plaintext write key, only used when `kms_api_key` is empty.
    pub api_key: String,
    /// Base64 KMS ciphertext of the write key.
    pub kms_api_key: String,
    #[serde(deserialize_with = "deserialize_string_or_default")]
    pub parser_name: String,
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub use_add_events_api: bool,
    pub ingest_url: String,
    pub log_level: LogLevel,
    /// Request timeout in seconds
    pub request_timeout: u64,
    pub https_proxy: Option<String>,
    pub attribute_encoding: AttributeEncoding,
    #[serde(skip)]
    pub server_attributes: Vec<ServerAttribute>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: String::default(),
            kms_api_key: String::default(),
            parser_name: DEFAULT_PARSER_NAME.to_string(),
            use_add_events_api: false,
            ingest_url: DEFAULT_INGEST_URL.to_string(),
            log_level: LogLevel::default(),
            request_timeout: 10,
            https_proxy: None,
            attribute_encoding: AttributeEncoding::default(),
            server_attributes: Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    ParseError(String),
    #[error("no api key configured, set KMS_API_KEY or API_KEY")]
    MissingApiKey,
}

#[allow(clippy::module_name_repetitions)]
pub fn get_config(config_directory: &Path) -> Result<Config, ConfigError> {
    let path = config_directory.join(CONFIG_FILE_NAME);

    let figment = Figment::new()
        .merge(Yaml::file(&path))
        .merge(Env::raw().only(&CONFIG_ENV_KEYS));

    let mut config: Config = figment.extract().map_err(|err| {
        println!("Failed to parse forwarder config: {err}");
        ConfigError::ParseError(err.to_string())
    })?;

    if config.ingest_url.is_empty() {
        config.ingest_url = DEFAULT_INGEST_URL.to_string();
    }
    config.server_attributes = attributes::extract(utf8_env_vars(std::env::vars_os()));

    Ok(config)
}

/// Drops pairs whose key or value is not valid UTF-8 instead of panicking on them.
fn utf8_env_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

fn deserialize_string_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => {
            if s.trim().is_empty() {
                Ok(DEFAULT_PARSER_NAME.to_string())
            } else {
                Ok(s)
            }
        }
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom("expected a string or an integer")),
    }
}
