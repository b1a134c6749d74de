use secrecy::SecretString;

use crate::error::PaymentError;

pub const DEFAULT_CHECKOUT_URL: &str = "https://checkout.paycom.uz";

#[derive(Debug, Clone)]
pub struct PaymeConfig {
    pub merchant_id: String,
    /// Shared secret the gateway sends as the basic-auth password.
    pub secret_key: SecretString,
    pub checkout_url: String,
}

impl PaymeConfig {
    pub fn from_env() -> Result<Self, PaymentError> {
        let merchant_id = std::env::var("PAYME_MERCHANT_ID").map_err(|_| {
            PaymentError::Config("PAYME_MERCHANT_ID environment variable must be set".into())
        })?;

        let secret_key = std::env::var("PAYME_SECRET_KEY").map_err(|_| {
            PaymentError::Config("PAYME_SECRET_KEY environment variable must be set".into())
        })?;
        if secret_key.is_empty() {
            return Err(PaymentError::Config(
                "PAYME_SECRET_KEY must not be empty".into(),
            ));
        }

        let checkout_url = std::env::var("PAYME_CHECKOUT_URL")
            .unwrap_or_else(|_| DEFAULT_CHECKOUT_URL.to_string());

        Ok(Self {
            merchant_id,
            secret_key: SecretString::from(secret_key),
            checkout_url,
        })
    }
}
