use crate::payments::error::PaymentError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum chargeable amount, in cents (R$ 1,00).
pub const MIN_AMOUNT_CENTS: i64 = 100;

/// Customer identity fields as typed into the checkout form.
///
/// `cellphone` and `tax_id` keep their display punctuation; the provider
/// expects the formatted strings, so they are sent as-is. The persisted
/// record strips the tax id down to digits (see `digits_only`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub cellphone: String,
    pub tax_id: String,
}

impl Customer {
    pub fn validate(&self) -> Result<(), PaymentError> {
        for (field, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("cellphone", &self.cellphone),
            ("tax_id", &self.tax_id),
        ] {
            if value.trim().is_empty() {
                return Err(PaymentError::ValidationError {
                    message: format!("customer {} is required", field),
                    field: Some(field.to_string()),
                });
            }
        }
        Ok(())
    }
}

/// Billing lifecycle status as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixStatus {
    Pending,
    Paid,
    Expired,
    #[serde(rename = "CANCELED")]
    Cancelled,
    Failed,
    Unknown,
}

impl PixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixStatus::Pending => "PENDING",
            PixStatus::Paid => "PAID",
            PixStatus::Expired => "EXPIRED",
            PixStatus::Cancelled => "CANCELED",
            PixStatus::Failed => "FAILED",
            PixStatus::Unknown => "UNKNOWN",
        }
    }

    /// Terminal statuses stop the polling loop. EXPIRED is reported by the
    /// provider on listing but does not terminate polling on its own; the
    /// billing can still settle until the provider cancels it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PixStatus::Paid | PixStatus::Cancelled | PixStatus::Failed)
    }
}

impl fmt::Display for PixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PixStatus {
    type Err = std::convert::Infallible;

    /// Unrecognized provider strings map to `Unknown` so a new status
    /// value on their side cannot break the polling loop.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_uppercase().as_str() {
            "PENDING" => PixStatus::Pending,
            "PAID" => PixStatus::Paid,
            "EXPIRED" => PixStatus::Expired,
            "CANCELED" | "CANCELLED" => PixStatus::Cancelled,
            "FAILED" => PixStatus::Failed,
            _ => PixStatus::Unknown,
        })
    }
}

/// Provider-side billing object returned by billing creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Billing {
    pub id: String,
    pub url: Option<String>,
    pub amount: i64,
    pub status: PixStatus,
    /// Pix copy-paste payment string (BR Code).
    pub br_code: String,
    /// Base64-encoded QR code image of `br_code`.
    pub br_code_base64: String,
}

impl Billing {
    /// Decode the provider's base64 QR image into raw bytes. A
    /// `data:image/png;base64,` prefix is tolerated.
    pub fn qr_png_bytes(&self) -> Result<Vec<u8>, PaymentError> {
        let encoded = self
            .br_code_base64
            .split_once(',')
            .map(|(_, tail)| tail)
            .unwrap_or(&self.br_code_base64);
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| PaymentError::ProviderError {
                provider: "abacatepay".to_string(),
                message: format!("invalid base64 QR image: {}", e),
                provider_code: None,
            })
    }
}

// ---------------------------------------------------------------------------
// Formatter utilities (pure display transforms)
// ---------------------------------------------------------------------------

/// Strip everything but ASCII digits.
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Mask a CPF for display: `12345678909` → `123.456.789-09`.
/// Inputs with other than 11 digits are returned digits-only, unmasked.
pub fn format_cpf(value: &str) -> String {
    let digits = digits_only(value);
    if digits.len() != 11 {
        return digits;
    }
    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

/// Mask a Brazilian cellphone for display: `11987654321` → `(11) 98765-4321`.
/// Ten-digit landline-style numbers split as `(11) 8765-4321`; anything
/// else is returned digits-only, unmasked.
pub fn format_cellphone(value: &str) -> String {
    let digits = digits_only(value);
    match digits.len() {
        11 => format!("({}) {}-{}", &digits[0..2], &digits[2..7], &digits[7..11]),
        10 => format!("({}) {}-{}", &digits[0..2], &digits[2..6], &digits[6..10]),
        _ => digits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_validation_requires_every_field() {
        let valid = Customer {
            name: "Maria Silva".to_string(),
            email: "maria@example.com".to_string(),
            cellphone: "(11) 98765-4321".to_string(),
            tax_id: "123.456.789-09".to_string(),
        };
        assert!(valid.validate().is_ok());

        let mut missing_email = valid.clone();
        missing_email.email = "   ".to_string();
        let err = missing_email.validate().unwrap_err();
        match err {
            PaymentError::ValidationError { field, .. } => {
                assert_eq!(field.as_deref(), Some("email"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn status_parsing_accepts_both_cancel_spellings() {
        assert_eq!("CANCELED".parse::<PixStatus>().unwrap(), PixStatus::Cancelled);
        assert_eq!("cancelled".parse::<PixStatus>().unwrap(), PixStatus::Cancelled);
    }

    #[test]
    fn status_parsing_maps_unrecognized_to_unknown() {
        assert_eq!("REFUNDING".parse::<PixStatus>().unwrap(), PixStatus::Unknown);
    }

    #[test]
    fn terminal_set_is_paid_cancelled_failed() {
        assert!(PixStatus::Paid.is_terminal());
        assert!(PixStatus::Cancelled.is_terminal());
        assert!(PixStatus::Failed.is_terminal());
        assert!(!PixStatus::Pending.is_terminal());
        assert!(!PixStatus::Expired.is_terminal());
        assert!(!PixStatus::Unknown.is_terminal());
    }

    #[test]
    fn cancelled_serializes_with_provider_spelling() {
        assert_eq!(PixStatus::Cancelled.as_str(), "CANCELED");
    }

    #[test]
    fn digits_only_strips_punctuation() {
        assert_eq!(digits_only("123.456.789-09"), "12345678909");
        assert_eq!(digits_only("(11) 98765-4321"), "11987654321");
        assert_eq!(digits_only(""), "");
    }

    #[test]
    fn cpf_masking_round_trips() {
        assert_eq!(format_cpf("12345678909"), "123.456.789-09");
        assert_eq!(format_cpf("123.456.789-09"), "123.456.789-09");
        // wrong length: digits only, no mask
        assert_eq!(format_cpf("1234567"), "1234567");
    }

    #[test]
    fn cellphone_masking_handles_both_lengths() {
        assert_eq!(format_cellphone("11987654321"), "(11) 98765-4321");
        assert_eq!(format_cellphone("1187654321"), "(11) 8765-4321");
        assert_eq!(format_cellphone("123"), "123");
    }

    #[test]
    fn qr_bytes_decode_with_and_without_data_url_prefix() {
        let billing = Billing {
            id: "b1".to_string(),
            url: None,
            amount: 150,
            status: PixStatus::Pending,
            br_code: "000201".to_string(),
            br_code_base64: "aGVsbG8=".to_string(),
        };
        assert_eq!(billing.qr_png_bytes().unwrap(), b"hello");

        let prefixed = Billing {
            br_code_base64: "data:image/png;base64,aGVsbG8=".to_string(),
            ..billing
        };
        assert_eq!(prefixed.qr_png_bytes().unwrap(), b"hello");
    }

    #[test]
    fn invalid_base64_is_a_provider_error() {
        let billing = Billing {
            id: "b1".to_string(),
            url: None,
            amount: 150,
            status: PixStatus::Pending,
            br_code: "000201".to_string(),
            br_code_base64: "%%%not-base64%%%".to_string(),
        };
        assert!(billing.qr_png_bytes().is_err());
    }
}
