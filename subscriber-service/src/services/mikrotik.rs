//! MikroTik RouterOS REST client.
//!
//! Disables PPP secrets on the customer's router when a subscription is
//! suspended, and drops the active PPP session so the cutoff is
//! immediate rather than waiting for the next reconnect.

use crate::config::MikrotikConfig;
use anyhow::anyhow;
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::error::AppError;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Client for the RouterOS REST API (`/rest` on RouterOS v7).
#[derive(Clone)]
pub struct MikrotikClient {
    client: Client,
    config: MikrotikConfig,
}

/// A PPP secret row as returned by `/rest/ppp/secret`.
#[derive(Debug, Deserialize)]
struct PppSecret {
    #[serde(rename = ".id")]
    id: String,
    #[allow(dead_code)]
    name: String,
}

/// An active PPP session row as returned by `/rest/ppp/active`.
#[derive(Debug, Deserialize)]
struct PppActive {
    #[serde(rename = ".id")]
    id: String,
}

impl MikrotikClient {
    /// Build a client. Routers commonly run self-signed certificates, so
    /// certificate validation follows configuration.
    pub fn new(config: MikrotikConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow!("Failed to build MikroTik HTTP client: {}", e))
            })?;
        Ok(Self { client, config })
    }

    /// Whether the router integration is enabled and has credentials.
    pub fn is_configured(&self) -> bool {
        self.config.enabled
            && !self.config.username.is_empty()
            && !self.config.password.expose_secret().is_empty()
    }

    fn base_url(&self, router_host: &str) -> String {
        format!(
            "{}://{}:{}/rest",
            self.config.rest_scheme, router_host, self.config.rest_port
        )
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(self.config.max_retry_secs)),
            ..ExponentialBackoff::default()
        }
    }

    /// Disable a PPP secret on the given router and drop its active
    /// session if one exists. Network failures are retried with
    /// exponential backoff; a missing secret is reported immediately.
    #[instrument(skip(self), fields(router_host = %router_host, secret_name = %secret_name))]
    pub async fn disable_ppp_secret(
        &self,
        router_host: &str,
        secret_name: &str,
    ) -> Result<(), AppError> {
        if !self.is_configured() {
            return Err(AppError::ExternalServiceFailure(anyhow!(
                "MikroTik integration is not configured"
            )));
        }

        let base = self.base_url(router_host);

        backoff::future::retry(self.retry_policy(), || async {
            self.disable_once(&base, secret_name)
                .await
                .map_err(classify_backoff)
        })
        .await?;

        info!("PPP secret disabled on router");
        Ok(())
    }

    async fn disable_once(&self, base: &str, secret_name: &str) -> Result<(), DisableError> {
        let secrets: Vec<PppSecret> = self
            .get_json(&format!("{}/ppp/secret?name={}", base, secret_name))
            .await?;

        let secret = secrets
            .into_iter()
            .next()
            .ok_or_else(|| DisableError::SecretNotFound(secret_name.to_string()))?;

        let url = format!("{}/ppp/secret/{}", base, secret.id);
        let response = self
            .client
            .patch(&url)
            .basic_auth(
                &self.config.username,
                Some(self.config.password.expose_secret()),
            )
            .json(&serde_json::json!({ "disabled": "true" }))
            .send()
            .await
            .map_err(DisableError::Network)?;
        check_status("disable secret", response.status())?;

        // Best effort: drop the live session so the customer does not
        // stay online until the next PPP renegotiation.
        let actives: Vec<PppActive> = match self
            .get_json(&format!("{}/ppp/active?name={}", base, secret_name))
            .await
        {
            Ok(actives) => actives,
            Err(e) => {
                warn!(error = %e, "Failed to query active PPP sessions");
                return Ok(());
            }
        };

        for active in actives {
            let url = format!("{}/ppp/active/{}", base, active.id);
            if let Err(e) = self
                .client
                .delete(&url)
                .basic_auth(
                    &self.config.username,
                    Some(self.config.password.expose_secret()),
                )
                .send()
                .await
            {
                warn!(error = %e, "Failed to drop active PPP session");
            }
        }

        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, DisableError> {
        let response = self
            .client
            .get(url)
            .basic_auth(
                &self.config.username,
                Some(self.config.password.expose_secret()),
            )
            .send()
            .await
            .map_err(DisableError::Network)?;
        check_status("query", response.status())?;
        response.json::<T>().await.map_err(DisableError::Network)
    }
}

#[derive(Debug, thiserror::Error)]
enum DisableError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("router rejected {0}: status {1}")]
    Rejected(&'static str, StatusCode),
    #[error("PPP secret '{0}' not found on router")]
    SecretNotFound(String),
}

fn check_status(op: &'static str, status: StatusCode) -> Result<(), DisableError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(DisableError::Rejected(op, status))
    }
}

/// Retry transient network and server-side failures; a missing secret or
/// an auth rejection will not improve with retries.
fn classify_backoff(e: DisableError) -> backoff::Error<AppError> {
    match e {
        DisableError::Network(_) => {
            backoff::Error::transient(AppError::ExternalServiceFailure(anyhow!("{}", e)))
        }
        DisableError::Rejected(_, status) if status.is_server_error() => {
            backoff::Error::transient(AppError::ExternalServiceFailure(anyhow!("{}", e)))
        }
        other => backoff::Error::permanent(AppError::ExternalServiceFailure(anyhow!("{}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn test_config(enabled: bool) -> MikrotikConfig {
        MikrotikConfig {
            enabled,
            username: "api-user".to_string(),
            password: Secret::new("api-pass".to_string()),
            rest_scheme: "https".to_string(),
            rest_port: 443,
            accept_invalid_certs: true,
            request_timeout_secs: 10,
            max_retry_secs: 30,
        }
    }

    #[test]
    fn configured_when_enabled_with_credentials() {
        let client = MikrotikClient::new(test_config(true)).unwrap();
        assert!(client.is_configured());
    }

    #[test]
    fn not_configured_when_disabled() {
        let client = MikrotikClient::new(test_config(false)).unwrap();
        assert!(!client.is_configured());
    }

    #[test]
    fn not_configured_without_credentials() {
        let mut config = test_config(true);
        config.username = String::new();
        let client = MikrotikClient::new(config).unwrap();
        assert!(!client.is_configured());
    }

    #[test]
    fn base_url_uses_configured_port() {
        let client = MikrotikClient::new(test_config(true)).unwrap();
        assert_eq!(
            client.base_url("10.0.0.1"),
            "https://10.0.0.1:443/rest"
        );
    }

    #[test]
    fn missing_secret_is_permanent() {
        let e = DisableError::SecretNotFound("pppoe-budi".to_string());
        assert!(matches!(classify_backoff(e), backoff::Error::Permanent(_)));
    }

    #[test]
    fn server_error_is_transient() {
        let e = DisableError::Rejected("query", StatusCode::BAD_GATEWAY);
        assert!(matches!(
            classify_backoff(e),
            backoff::Error::Transient { .. }
        ));
    }
}
