use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self { client, timeout })
    }

    /// Issue one JSON request against `url`. If the send itself fails with a
    /// blocked or unreachable transport and `relay_url` is configured, retry
    /// exactly once against the relay. No backoff, no further fallback.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        relay_url: Option<&str>,
        bearer_token: &str,
        body: Option<&JsonValue>,
    ) -> PaymentResult<T> {
        match self.send_once(method.clone(), url, bearer_token, body).await {
            Ok(response) => self.read_json(response).await,
            Err(send_err) => {
                let relay_url = match relay_url {
                    Some(relay) if is_blocked_transport(&send_err) => relay,
                    _ => {
                        return Err(PaymentError::NetworkError {
                            message: format!("provider request failed: {}", send_err),
                        })
                    }
                };

                warn!(
                    url = %url,
                    relay_url = %relay_url,
                    structured = send_err.is_connect() || send_err.is_timeout(),
                    error = %send_err,
                    "direct provider call blocked, retrying once through relay"
                );

                let response = self
                    .send_once(method, relay_url, bearer_token, body)
                    .await
                    .map_err(|e| PaymentError::NetworkError {
                        message: format!("relay request failed: {}", e),
                    })?;
                self.read_json(response).await
            }
        }
    }

    async fn send_once(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: &str,
        body: Option<&JsonValue>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .bearer_auth(bearer_token)
            .header("Content-Type", "application/json");
        if let Some(payload) = body {
            request = request.json(payload);
        }
        request.send().await
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> PaymentResult<T> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(PaymentError::ProviderError {
                provider: "abacatepay".to_string(),
                message: extract_provider_message(&text)
                    .unwrap_or_else(|| format!("HTTP {}: {}", status, text)),
                provider_code: Some(status.as_u16().to_string()),
            });
        }

        serde_json::from_str::<T>(&text).map_err(|e| PaymentError::ProviderError {
            provider: "abacatepay".to_string(),
            message: format!("invalid provider JSON response: {}", e),
            provider_code: None,
        })
    }
}

/// Decide whether a send failure warrants the relay retry. Structured
/// signals from reqwest come first; the generic "error sending request"
/// message match is an imperfect last-resort heuristic kept for transports
/// that surface no classification.
fn is_blocked_transport(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }
    let fired = message_looks_blocked(&err.to_string());
    if fired {
        warn!(error = %err, "relay heuristic matched on error text only");
    }
    fired
}

/// Text-level fallback classification for transport failures.
pub fn message_looks_blocked(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("error sending request")
        || m.contains("network request failed")
        || m.contains("connection refused")
        || m.contains("connection reset")
}

/// Pull the human-facing message out of a provider error body, which may be
/// `{"error": "..."}`, `{"message": "..."}` or `{"error": {"message": ...}}`.
pub fn extract_provider_message(body: &str) -> Option<String> {
    let parsed: JsonValue = serde_json::from_str(body).ok()?;
    for key in ["error", "message"] {
        match parsed.get(key) {
            Some(JsonValue::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(JsonValue::Object(obj)) => {
                if let Some(JsonValue::String(s)) = obj.get("message") {
                    if !s.is_empty() {
                        return Some(s.clone());
                    }
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_message_heuristic_matches_known_signatures() {
        assert!(message_looks_blocked("error sending request for url (...)"));
        assert!(message_looks_blocked("TypeError: Network request failed"));
        assert!(message_looks_blocked("Connection refused (os error 111)"));
        assert!(!message_looks_blocked("HTTP 401 Unauthorized"));
        assert!(!message_looks_blocked("invalid JSON"));
    }

    #[test]
    fn provider_message_extraction_handles_common_shapes() {
        assert_eq!(
            extract_provider_message(r#"{"error":"Invalid taxId"}"#).as_deref(),
            Some("Invalid taxId")
        );
        assert_eq!(
            extract_provider_message(r#"{"message":"Unauthorized"}"#).as_deref(),
            Some("Unauthorized")
        );
        assert_eq!(
            extract_provider_message(r#"{"error":{"message":"amount too low"}}"#).as_deref(),
            Some("amount too low")
        );
        assert_eq!(extract_provider_message("<html>502</html>"), None);
        assert_eq!(extract_provider_message(r#"{"error":""}"#), None);
    }
}
