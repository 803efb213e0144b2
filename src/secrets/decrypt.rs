use crate::config::aws::AwsConfig;
use crate::error::ForwarderError;
use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Instant;
use tracing::debug;

const KMS_SERVICE: &str = "kms";
const KMS_DECRYPT_TARGET: &str = "TrentService.Decrypt";

/// Turns the configured ciphertext into the plaintext write credential.
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt(&self, ciphertext: &str) -> Result<String, ForwarderError>;
}

pub struct KmsDecryptor {
    client: Client,
    aws_config: AwsConfig,
    endpoint: String,
}

impl KmsDecryptor {
    #[must_use]
    pub fn new(client: Client, aws_config: AwsConfig) -> Self {
        let endpoint = format!("https://{}", kms_host(&aws_config));
        KmsDecryptor {
            client,
            aws_config,
            endpoint,
        }
    }

    /// Sends requests to `endpoint` instead of the regional KMS host. The signed `host`
    /// header still names the regional host.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    async fn request(&self, json_body: &Value) -> Result<Value, ForwarderError> {
        let headers = build_signed_headers(
            &self.aws_config,
            &RequestArgs {
                service: KMS_SERVICE,
                body: json_body,
                time: Utc::now(),
                x_amz_target: KMS_DECRYPT_TARGET,
            },
        )
        .map_err(ForwarderError::Decryption)?;

        let body = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .body(json_body.to_string())
            .send()
            .await
            .map_err(|e| ForwarderError::Decryption(e.to_string()))?
            .text()
            .await
            .map_err(|e| ForwarderError::Decryption(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ForwarderError::Decryption(e.to_string()))
    }
}

#[async_trait]
impl Decryptor for KmsDecryptor {
    async fn decrypt(&self, ciphertext: &str) -> Result<String, ForwarderError> {
        // Keys encrypted from the AWS console carry the function name as encryption
        // context, keys encrypted with the CLI carry none. Try both.
        let before_decrypt = Instant::now();
        let v = self
            .request(&serde_json::json!({ "CiphertextBlob": ciphertext }))
            .await?;

        let v = if v["Plaintext"].is_string() {
            v
        } else {
            debug!("Decrypt without encryption context failed, retrying with function name");
            self.request(&serde_json::json!({
                "CiphertextBlob": ciphertext,
                "EncryptionContext": { "LambdaFunctionName": self.aws_config.function_name },
            }))
            .await?
        };
        debug!("Decrypt took {}ms", before_decrypt.elapsed().as_millis());

        match v["Plaintext"].as_str() {
            Some(plaintext_b64) => {
                let plaintext = BASE64_STANDARD
                    .decode(plaintext_b64)
                    .map_err(|e| ForwarderError::Decryption(e.to_string()))?;
                String::from_utf8(plaintext).map_err(|e| ForwarderError::Decryption(e.to_string()))
            }
            None => Err(ForwarderError::Decryption(v.to_string())),
        }
    }
}

fn kms_host(aws_config: &AwsConfig) -> String {
    format!("{KMS_SERVICE}.{}.{}", aws_config.region, aws_config.domain())
}

struct RequestArgs<'a> {
    service: &'a str,
    body: &'a Value,
    time: DateTime<Utc>,
    x_amz_target: &'a str,
}

fn build_signed_headers(
    aws_config: &AwsConfig,
    header_values: &RequestArgs,
) -> Result<HeaderMap, String> {
    let amz_date = header_values.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = header_values.time.format("%Y%m%d").to_string();

    let host = format!(
        "{}.{}.{}",
        header_values.service,
        aws_config.region,
        aws_config.domain()
    );

    let canonical_uri = "/";
    let canonical_querystring = "";
    let canonical_headers = format!(
        "content-type:application/x-amz-json-1.1\nhost:{}\nx-amz-date:{}\nx-amz-security-token:{}\nx-amz-target:{}",
        host, amz_date, aws_config.aws_session_token, header_values.x_amz_target
    );
    let signed_headers = "content-type;host;x-amz-date;x-amz-security-token;x-amz-target";

    let payload_hash = Sha256::digest(header_values.body.to_string().as_bytes());
    let payload_hash_hex = hex::encode(payload_hash);

    let canonical_request = format!(
        "POST\n{canonical_uri}\n{canonical_querystring}\n{canonical_headers}\n\n{signed_headers}\n{payload_hash_hex}"
    );
    let algorithm = "AWS4-HMAC-SHA256";
    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, aws_config.region, header_values.service
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        algorithm,
        amz_date,
        credential_scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = get_aws4_signature_key(
        &aws_config.aws_secret_access_key,
        &date_stamp,
        aws_config.region.as_str(),
        header_values.service,
    )?;

    let signature = hex::encode(sign(&signing_key, &string_to_sign)?);

    let authorization_header = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        algorithm, aws_config.aws_access_key_id, credential_scope, signed_headers, signature
    );

    let header = |value: &str| HeaderValue::from_str(value).map_err(|e| e.to_string());
    let mut headers = HeaderMap::new();
    headers.insert("Authorization", header(&authorization_header)?);
    headers.insert("host", header(&host)?);
    headers.insert("Content-Type", header("application/x-amz-json-1.1")?);
    headers.insert("x-amz-date", header(&amz_date)?);
    headers.insert("x-amz-target", header(header_values.x_amz_target)?);
    headers.insert("x-amz-security-token", header(&aws_config.aws_session_token)?);
    Ok(headers)
}

fn sign(key: &[u8], msg: &str) -> Result<Vec<u8>, String> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).map_err(|err| format!("Error creating HMAC: {err}"))?;
    mac.update(msg.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn get_aws4_signature_key(
    key: &str,
    date_stamp: &str,
    region_name: &str,
    service_name: &str,
) -> Result<Vec<u8>, String> {
    let k_date = sign(format!("AWS4{key}").as_bytes(), date_stamp)?;
    let k_region = sign(&k_date, region_name)?;
    let k_service = sign(&k_region, service_name)?;
    sign(&k_service, "aws4_request")
}
