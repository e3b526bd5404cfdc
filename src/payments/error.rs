use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::NetworkError { .. })
    }

    /// Human-readable message suitable for direct display. Transport
    /// failures are rewritten to a connectivity message and missing
    /// configuration to a setup instruction; provider messages pass
    /// through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::ConfigurationError { .. } => {
                "Payment provider is not configured yet. Save your AbacatePay API key \
                 in the settings before checking out."
                    .to_string()
            }
            PaymentError::NetworkError { .. } => {
                "Could not reach the payment provider. Check your connection and try again."
                    .to_string()
            }
            PaymentError::ProviderError { message, .. } => message.clone(),
        }
    }
}
