use std::io::Read;

use base64::prelude::*;
use flate2::read::GzDecoder;
use serde::{Deserialize, Deserializer};

use crate::error::ForwarderError;

/// CloudWatch Logs subscription event as delivered by the Lambda runtime.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CloudWatchLogsEvent {
    #[serde(rename = "awslogs")]
    pub aws_logs: AwsLogs,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AwsLogs {
    /// Base64 encoded, gzip compressed `InputBatch`.
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputBatch {
    #[serde(default)]
    pub message_type: Option<String>,
    pub owner: String,
    pub log_group: String,
    pub log_stream: String,
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    pub log_events: Vec<InputEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct InputEvent {
    /// Milliseconds since epoch.
    pub timestamp: i64,
    pub id: String,
    pub message: String,
}

fn deserialize_null_as_empty<'de, D>(deserializer: D) -> Result<Vec<InputEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<InputEvent>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Base64 decodes and gunzips `data`, then parses the resulting JSON document.
pub fn decode(data: &str) -> Result<InputBatch, ForwarderError> {
    let compressed = BASE64_STANDARD
        .decode(data.trim())
        .map_err(|e| ForwarderError::Decompression(format!("invalid base64: {e}")))?;

    let mut decoder = GzDecoder::new(&compressed[..]);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| ForwarderError::Decompression(e.to_string()))?;

    serde_json::from_str(&text).map_err(|e| ForwarderError::Parse(e.to_string()))
}
