use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};

pub use auth_core::Claims;

pub const DEFAULT_TOKEN_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("JWT_SECRET_KEY environment variable must be set")]
    MissingSecret,

    #[error("Invalid JWT_EXPIRY_HOURS value: {0}")]
    InvalidExpiry(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("Token generation failed: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
}

/// HS256 signing material shared by the token issuer and the authz middleware.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    pub token_expiry_hours: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("token_expiry_hours", &self.token_expiry_hours)
            .finish_non_exhaustive()
    }
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, TokenError> {
        let secret = std::env::var("JWT_SECRET_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from)
            .ok_or(TokenError::MissingSecret)?;

        let token_expiry_hours = match std::env::var("JWT_EXPIRY_HOURS") {
            Ok(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|h| *h > 0)
                .ok_or(TokenError::InvalidExpiry(raw))?,
            Err(_) => DEFAULT_TOKEN_EXPIRY_HOURS,
        };

        let mut config = Self::from_secret(&secret);
        config.token_expiry_hours = token_expiry_hours;
        Ok(config)
    }

    pub fn from_secret(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            validation: Validation::new(Algorithm::HS256),
            token_expiry_hours: DEFAULT_TOKEN_EXPIRY_HOURS,
        }
    }

    pub fn issue_token(&self, user_id: i64, email: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.token_expiry_hours)).timestamp(),
        };
        self.encode_claims(&claims)
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(TokenError::Encode)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::debug!(error = %e, "Rejected access token");
                    TokenError::Invalid(e)
                }
            })
    }
}
