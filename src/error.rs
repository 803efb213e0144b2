//! Error types surfaced to the invoker of the forwarder.

/// Failures that abort a single invocation.
///
/// A remote status other than 200 is not represented here, see
/// [`crate::logs::dispatcher::DispatchOutcome::Rejected`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ForwarderError {
    /// The write credential could not be decrypted. The next invocation retries.
    #[error("failed to decrypt api key: {0}")]
    Decryption(String),
    /// The payload was not valid base64 or not a valid gzip stream.
    #[error("failed to decompress log payload: {0}")]
    Decompression(String),
    /// The decompressed payload was not a log batch document.
    #[error("failed to parse log payload: {0}")]
    Parse(String),
    #[error("failed to serialize request body: {0}")]
    Serialization(String),
    /// No response was received from the ingestion API.
    #[error("failed to send logs: {0}")]
    Transport(String),
}
