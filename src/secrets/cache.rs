use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::config::aws::AwsConfig;
use crate::config::{Config, ConfigError};
use crate::error::ForwarderError;
use crate::secrets::decrypt::{Decryptor, KmsDecryptor};

/// Process wide holder of the plaintext write credential.
///
/// The first successful decrypt is kept for the lifetime of the process. Concurrent callers
/// wait on the in-flight decrypt. A failed decrypt leaves the cache empty, so the next call
/// decrypts again.
pub struct SecretCache {
    ciphertext: String,
    decryptor: Option<Arc<dyn Decryptor>>,
    plaintext: OnceCell<String>,
}

impl SecretCache {
    #[must_use]
    pub fn new(ciphertext: String, decryptor: Arc<dyn Decryptor>) -> Self {
        SecretCache {
            ciphertext,
            decryptor: Some(decryptor),
            plaintext: OnceCell::new(),
        }
    }

    /// A cache holding a key that needs no decryption.
    #[must_use]
    pub fn from_plaintext(api_key: String) -> Self {
        SecretCache {
            ciphertext: String::new(),
            decryptor: None,
            plaintext: OnceCell::new_with(clean_api_key(&api_key)),
        }
    }

    /// An encrypted key wins over a plaintext one.
    pub fn from_config(config: &Config, client: &reqwest::Client) -> Result<Self, ConfigError> {
        if !config.kms_api_key.is_empty() {
            debug!("Using KMS encrypted api key");
            let decryptor = KmsDecryptor::new(client.clone(), AwsConfig::from_env());
            return Ok(SecretCache::new(
                config.kms_api_key.clone(),
                Arc::new(decryptor),
            ));
        }
        if !config.api_key.is_empty() {
            debug!("Using plaintext api key");
            return Ok(SecretCache::from_plaintext(config.api_key.clone()));
        }

        error!("{}", ConfigError::MissingApiKey);
        Err(ConfigError::MissingApiKey)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.plaintext.initialized()
    }

    pub async fn get(&self) -> Result<&str, ForwarderError> {
        let plaintext = self
            .plaintext
            .get_or_try_init(|| async move {
                let Some(decryptor) = &self.decryptor else {
                    return Err(ForwarderError::Decryption(
                        "no api key configured".to_string(),
                    ));
                };
                debug!("Decrypting api key");
                let decrypted = decryptor.decrypt(&self.ciphertext).await.inspect_err(|e| {
                    error!("Error decrypting key: {}", e);
                })?;
                clean_api_key(&decrypted)
                    .ok_or_else(|| ForwarderError::Decryption("API key has invalid format".to_string()))
            })
            .await?;
        Ok(plaintext.as_str())
    }
}

fn clean_api_key(key: &str) -> Option<String> {
    let clean_key = key.trim_end_matches('\n').replace(' ', "");
    if clean_key.is_empty() {
        error!("API key has invalid format");
        None
    } else {
        Some(clean_key)
    }
}
