use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, warn};

use crate::config::TurnstileConfig;

const TURNSTILE_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// Server-side CAPTCHA verification. Pass/fail only; the caller never
/// learns why a token was rejected.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> bool;
}

/// Cloudflare Turnstile verifier. Without a secret key (non-production
/// deployments) every token passes; with one, an upstream error or a
/// negative verdict fails the check.
pub struct TurnstileVerifier {
    http: reqwest::Client,
    config: Option<TurnstileConfig>,
    verify_url: String,
}

impl TurnstileVerifier {
    pub fn new(config: Option<TurnstileConfig>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            verify_url: TURNSTILE_VERIFY_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_verify_url(config: Option<TurnstileConfig>, verify_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            verify_url,
        }
    }
}

#[async_trait]
impl CaptchaVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str) -> bool {
        let Some(config) = &self.config else {
            warn!("TURNSTILE_SECRET_KEY not set, skipping CAPTCHA verification");
            return true;
        };

        let params = [
            ("secret", config.secret_key.as_str()),
            ("response", token),
        ];

        let response = match self.http.post(&self.verify_url).form(&params).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Turnstile API error: {e}");
                return false;
            }
        };

        match response.json::<VerifyResponse>().await {
            Ok(body) => {
                if !body.success {
                    error!(error_codes = ?body.error_codes, "Turnstile verification failed");
                }
                body.success
            }
            Err(e) => {
                error!("Turnstile response parse error: {e}");
                false
            }
        }
    }
}

#[derive(Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn configured(server: &MockServer) -> TurnstileVerifier {
        TurnstileVerifier::with_verify_url(
            Some(TurnstileConfig {
                secret_key: "secret".to_string(),
            }),
            format!("{}/siteverify", server.uri()),
        )
    }

    #[tokio::test]
    async fn passes_without_a_configured_secret() {
        let verifier = TurnstileVerifier::new(None);
        assert!(verifier.verify("anything").await);
    }

    #[tokio::test]
    async fn accepts_a_positive_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/siteverify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .mount(&server)
            .await;

        assert!(configured(&server).verify("good-token").await);
    }

    #[tokio::test]
    async fn rejects_a_negative_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/siteverify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error-codes": ["invalid-input-response"]
            })))
            .mount(&server)
            .await;

        assert!(!configured(&server).verify("bad-token").await);
    }
}
