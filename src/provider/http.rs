//! HTTP liveness client for a configured provider.
//!
//! # Responsibilities
//! - Build the probe URL from the provider's base URL and health path
//!   (the health path is appended under any path prefix on the base URL)
//! - Attach the provider credential when one is configured
//! - Classify the response: anything below 500 means reachable

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use url::Url;

use crate::config::ProviderConfig;
use crate::provider::{ProbeError, ProviderClient, ProviderId};

/// Probes a provider over HTTP.
#[derive(Clone)]
pub struct HttpProviderClient {
    id: ProviderId,
    probe_url: Url,
    bearer_token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpProviderClient {
    /// Create a client from provider configuration.
    ///
    /// The credential, if any, is read once from the environment variable
    /// named in `api_key_env`.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProbeError> {
        let mut base: Url = config.base_url.parse().map_err(|e| {
            ProbeError::InvalidEndpoint(format!("'{}': {}", config.base_url, e))
        })?;
        // The health path extends any path prefix on the base URL.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let probe_url = base.join(config.health_path.trim_start_matches('/')).map_err(|e| {
            ProbeError::InvalidEndpoint(format!("'{}' + '{}': {}", config.base_url, config.health_path, e))
        })?;

        let bearer_token = config
            .api_key_env
            .as_deref()
            .and_then(|var| match std::env::var(var) {
                Ok(token) => Some(token),
                Err(_) => {
                    tracing::warn!(provider = %config.id, env = %var, "Provider credential not set, probing unauthenticated");
                    None
                }
            });

        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        Ok(Self {
            id: ProviderId::new(&config.id),
            probe_url,
            bearer_token,
            timeout,
            client,
        })
    }

    /// The URL hit by each probe.
    pub fn probe_url(&self) -> &Url {
        &self.probe_url
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn probe_timeout(&self) -> Duration {
        self.timeout
    }

    async fn liveness(&self) -> Result<(), ProbeError> {
        let mut request = self
            .client
            .get(self.probe_url.clone())
            .header(USER_AGENT, "railswitch-health-check");
        if let Some(token) = &self.bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(self.timeout.as_millis() as u64)
            } else {
                ProbeError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProbeError::ServerError(status.as_u16()));
        }
        if status.is_client_error() {
            tracing::debug!(provider = %self.id, status = %status, "Probe rejected but endpoint reachable");
        }
        Ok(())
    }
}

impl std::fmt::Debug for HttpProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderClient")
            .field("id", &self.id)
            .field("probe_url", &self.probe_url.as_str())
            .field("timeout_ms", &self.timeout.as_millis())
            .field("authenticated", &self.bearer_token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config(base_url: &str) -> ProviderConfig {
        ProviderConfig {
            id: "chapa_et".to_string(),
            base_url: base_url.to_string(),
            health_path: "/v1/ping".to_string(),
            timeout_ms: 15_000,
            api_key_env: None,
        }
    }

    #[test]
    fn test_probe_url_joined() {
        let client = HttpProviderClient::from_config(&provider_config("https://api.chapa.co")).unwrap();
        assert_eq!(client.probe_url().as_str(), "https://api.chapa.co/v1/ping");
        assert_eq!(client.probe_timeout(), Duration::from_secs(15));
        assert_eq!(client.id().as_str(), "chapa_et");
    }

    #[test]
    fn test_probe_url_keeps_base_path_prefix() {
        let mut config = provider_config("https://sandbox.momodeveloper.mtn.com/collection");
        config.health_path = "/health".to_string();
        let client = HttpProviderClient::from_config(&config).unwrap();
        assert_eq!(
            client.probe_url().as_str(),
            "https://sandbox.momodeveloper.mtn.com/collection/health"
        );

        config.health_path = "/".to_string();
        let client = HttpProviderClient::from_config(&config).unwrap();
        assert_eq!(client.probe_url().as_str(), "https://sandbox.momodeveloper.mtn.com/collection/");

        config.base_url = "https://api.chapa.co/".to_string();
        config.health_path = "v1/ping".to_string();
        let client = HttpProviderClient::from_config(&config).unwrap();
        assert_eq!(client.probe_url().as_str(), "https://api.chapa.co/v1/ping");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = HttpProviderClient::from_config(&provider_config("not a url")).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_debug_hides_token() {
        let mut config = provider_config("https://api.chapa.co");
        config.api_key_env = Some("RAILSWITCH_TEST_TOKEN_HIDDEN".to_string());
        std::env::set_var("RAILSWITCH_TEST_TOKEN_HIDDEN", "sk_live_secret");
        let client = HttpProviderClient::from_config(&config).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk_live_secret"));
        assert!(debug.contains("authenticated: true"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) is closed on loopback in test environments.
        let client = HttpProviderClient::from_config(&provider_config("http://127.0.0.1:9")).unwrap();
        let err = client.liveness().await.unwrap_err();
        assert!(matches!(err, ProbeError::Transport(_) | ProbeError::Timeout(_)));
    }
}
