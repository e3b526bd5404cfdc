use crate::config::ProviderConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PixProvider;
use crate::payments::types::{Billing, Customer, PixStatus};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Seconds until an unpaid billing expires on the provider side.
const BILLING_EXPIRES_IN_SECS: u64 = 3600;

pub struct AbacatePayProvider {
    config: ProviderConfig,
    http: PaymentHttpClient,
}

impl AbacatePayProvider {
    pub fn new(config: ProviderConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(Duration::from_secs(config.request_timeout))?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        let config = ProviderConfig::from_env().map_err(|e| PaymentError::ConfigurationError {
            message: e.to_string(),
        })?;
        Self::new(config)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn relay_endpoint(&self, path: &str) -> Option<String> {
        self.config
            .relay_base_url
            .as_ref()
            .map(|base| format!("{}{}", base, path))
    }

    /// Correlation tag sent as `metadata.externalId`, derived from the
    /// current time the way the checkout always has.
    fn external_id() -> String {
        format!("pix-checkout-{}", chrono::Utc::now().timestamp_millis())
    }
}

#[async_trait]
impl PixProvider for AbacatePayProvider {
    async fn create_billing(
        &self,
        api_key: &str,
        customer: &Customer,
        amount_cents: i64,
    ) -> PaymentResult<Billing> {
        customer.validate()?;
        if amount_cents <= 0 {
            return Err(PaymentError::ValidationError {
                message: "amount must be a positive number of cents".to_string(),
                field: Some("amount".to_string()),
            });
        }

        // Cellphone and taxId go out formatted as typed; bare digits are
        // rejected by the provider.
        let payload = serde_json::json!({
            "amount": amount_cents,
            "expiresIn": BILLING_EXPIRES_IN_SECS,
            "description": "Pix checkout",
            "customer": {
                "name": customer.name,
                "cellphone": customer.cellphone,
                "email": customer.email,
                "taxId": customer.tax_id,
            },
            "metadata": { "externalId": Self::external_id() },
        });

        let path = "/pixQrCode/create";
        let raw: AbacateEnvelope<CreateBillingData> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(path),
                self.relay_endpoint(path).as_deref(),
                api_key,
                Some(&payload),
            )
            .await?;

        let billing = billing_from_response(raw.data)?;
        info!(
            billing_id = %billing.id,
            amount = billing.amount,
            "abacatepay billing created"
        );
        Ok(billing)
    }

    async fn check_status(&self, api_key: &str, billing_id: &str) -> PixStatus {
        let path = format!("/pixQrCode/list?id={}", billing_id);
        let result: PaymentResult<AbacateEnvelope<Vec<BillingListItem>>> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&path),
                self.relay_endpoint(&path).as_deref(),
                api_key,
                None,
            )
            .await;

        match result {
            Ok(raw) => status_from_list(&raw.data, billing_id),
            Err(e) => {
                // A transient failure must not read as a terminal one;
                // report PENDING and let the poll loop try again.
                warn!(
                    billing_id = %billing_id,
                    error = %e,
                    "status check failed, degrading to PENDING"
                );
                PixStatus::Pending
            }
        }
    }

    fn name(&self) -> &'static str {
        "abacatepay"
    }
}

// ---------------------------------------------------------------------------
// Provider wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AbacateEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBillingData {
    id: String,
    #[serde(default)]
    url: Option<String>,
    amount: i64,
    status: String,
    #[serde(default)]
    br_code: Option<String>,
    #[serde(default)]
    br_code_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BillingListItem {
    id: String,
    status: String,
}

/// A creation response without a payment code is unusable no matter what
/// the HTTP status said; treat it as a schema mismatch, not retried.
fn billing_from_response(data: CreateBillingData) -> PaymentResult<Billing> {
    let br_code = match data.br_code {
        Some(code) if !code.is_empty() => code,
        _ => {
            return Err(PaymentError::ProviderError {
                provider: "abacatepay".to_string(),
                message: "billing response is missing the brCode payment field".to_string(),
                provider_code: None,
            })
        }
    };

    Ok(Billing {
        id: data.id,
        url: data.url,
        amount: data.amount,
        status: data.status.parse().unwrap_or(PixStatus::Unknown),
        br_code,
        br_code_base64: data.br_code_base64.unwrap_or_default(),
    })
}

/// The list route has no get-by-id variant; locate the billing client-side.
/// A missing entry reads as PENDING for the same reason transport failures do.
fn status_from_list(items: &[BillingListItem], billing_id: &str) -> PixStatus {
    items
        .iter()
        .find(|item| item.id == billing_id)
        .map(|item| item.status.parse().unwrap_or(PixStatus::Unknown))
        .unwrap_or(PixStatus::Pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with_unroutable_endpoints() -> AbacatePayProvider {
        // Port 1 on loopback refuses connections immediately, exercising
        // both the direct attempt and the relay retry without real network.
        AbacatePayProvider::new(ProviderConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            relay_base_url: Some("http://127.0.0.1:1".to_string()),
            request_timeout: 2,
        })
        .expect("provider init should succeed")
    }

    fn sample_customer() -> Customer {
        Customer {
            name: "Maria Silva".to_string(),
            email: "maria@example.com".to_string(),
            cellphone: "(11) 98765-4321".to_string(),
            tax_id: "123.456.789-09".to_string(),
        }
    }

    #[tokio::test]
    async fn check_status_degrades_to_pending_on_transport_failure() {
        let provider = provider_with_unroutable_endpoints();
        let status = provider.check_status("sk_test", "bill_1").await;
        assert_eq!(status, PixStatus::Pending);
    }

    #[tokio::test]
    async fn create_billing_propagates_transport_failure() {
        let provider = provider_with_unroutable_endpoints();
        let err = provider
            .create_billing("sk_test", &sample_customer(), 150)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NetworkError { .. }));
    }

    #[tokio::test]
    async fn create_billing_rejects_non_positive_amount_locally() {
        let provider = provider_with_unroutable_endpoints();
        let err = provider
            .create_billing("sk_test", &sample_customer(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::ValidationError { .. }));
    }

    #[test]
    fn create_response_parses_the_data_envelope() {
        let raw = r#"{"data":{"id":"b1","url":"https://pay.example","amount":150,
            "status":"PENDING","brCode":"000201xyz","brCodeBase64":"aGVsbG8="}}"#;
        let envelope: AbacateEnvelope<CreateBillingData> = serde_json::from_str(raw).unwrap();
        let billing = billing_from_response(envelope.data).unwrap();
        assert_eq!(billing.id, "b1");
        assert_eq!(billing.amount, 150);
        assert_eq!(billing.status, PixStatus::Pending);
        assert_eq!(billing.br_code, "000201xyz");
    }

    #[test]
    fn missing_br_code_is_a_schema_mismatch() {
        let raw = r#"{"data":{"id":"b1","amount":150,"status":"PENDING"}}"#;
        let envelope: AbacateEnvelope<CreateBillingData> = serde_json::from_str(raw).unwrap();
        let err = billing_from_response(envelope.data).unwrap_err();
        match err {
            PaymentError::ProviderError { message, .. } => {
                assert!(message.contains("brCode"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn list_status_matches_by_id_client_side() {
        let items = vec![
            BillingListItem {
                id: "other".to_string(),
                status: "PAID".to_string(),
            },
            BillingListItem {
                id: "b1".to_string(),
                status: "CANCELED".to_string(),
            },
        ];
        assert_eq!(status_from_list(&items, "b1"), PixStatus::Cancelled);
    }

    #[test]
    fn absent_list_entry_reads_as_pending() {
        assert_eq!(status_from_list(&[], "b1"), PixStatus::Pending);
    }

    #[test]
    fn external_id_carries_the_checkout_prefix() {
        let id = AbacatePayProvider::external_id();
        assert!(id.starts_with("pix-checkout-"));
        assert!(id["pix-checkout-".len()..].parse::<i64>().is_ok());
    }
}
