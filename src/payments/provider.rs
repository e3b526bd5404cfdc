use crate::payments::error::PaymentResult;
use crate::payments::types::{Billing, Customer, PixStatus};
use async_trait::async_trait;

/// Seam between the checkout flow and the payment provider. The service
/// and poller hold this as a trait object so tests can substitute fakes.
#[async_trait]
pub trait PixProvider: Send + Sync {
    /// Create a provider-side billing for `amount_cents`. Customer
    /// cellphone and tax id must be the display-formatted strings as
    /// typed; the provider rejects bare digits for those fields.
    async fn create_billing(
        &self,
        api_key: &str,
        customer: &Customer,
        amount_cents: i64,
    ) -> PaymentResult<Billing>;

    /// Fetch the current billing status. Infallible: transport or parse
    /// failures degrade to `PixStatus::Pending` so callers keep polling
    /// instead of failing a payment over a network blip.
    async fn check_status(&self, api_key: &str, billing_id: &str) -> PixStatus;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProvider;

    #[async_trait]
    impl PixProvider for MockProvider {
        async fn create_billing(
            &self,
            _api_key: &str,
            _customer: &Customer,
            amount_cents: i64,
        ) -> PaymentResult<Billing> {
            Ok(Billing {
                id: "mock_billing".to_string(),
                url: Some("https://example.com/pay".to_string()),
                amount: amount_cents,
                status: PixStatus::Pending,
                br_code: "000201mock".to_string(),
                br_code_base64: "aGVsbG8=".to_string(),
            })
        }

        async fn check_status(&self, _api_key: &str, _billing_id: &str) -> PixStatus {
            PixStatus::Paid
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_provider() {
        let provider: Box<dyn PixProvider> = Box::new(MockProvider);
        let customer = Customer {
            name: "Maria Silva".to_string(),
            email: "maria@example.com".to_string(),
            cellphone: "(11) 98765-4321".to_string(),
            tax_id: "123.456.789-09".to_string(),
        };

        let billing = provider
            .create_billing("sk_test", &customer, 150)
            .await
            .expect("billing creation should succeed");
        assert_eq!(billing.amount, 150);
        assert_eq!(billing.status, PixStatus::Pending);

        let status = provider.check_status("sk_test", &billing.id).await;
        assert_eq!(status, PixStatus::Paid);
    }
}
