use crate::config::Config;
use core::time::Duration;
use std::error::Error;
use tracing::error;

#[must_use]
pub fn get_client(config: &Config) -> reqwest::Client {
    build_client(config).unwrap_or_else(|e| {
        error!(
            "Unable to parse proxy configuration: {}, no proxy will be used",
            e
        );
        reqwest::Client::new()
    })
}

fn build_client(config: &Config) -> Result<reqwest::Client, Box<dyn Error>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout))
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        // Enable TCP keepalive
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if let Some(https_uri) = &config.https_proxy {
        let proxy = reqwest::Proxy::https(https_uri.clone())?;
        Ok(client.proxy(proxy).build()?)
    } else {
        Ok(client.build()?)
    }
}
