use chrono::Duration;
use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;

use super::claims::Claims;
use super::claims::TokenPurpose;
use super::errors::TokenError;

/// Mints and verifies signed, time-bounded tokens.
///
/// Holds the process-wide signing secret, loaded once at startup and injected
/// here; there is no runtime key rotation. Uses HS256 (HMAC with SHA-256).
///
/// # Security Notes
/// - The secret should be at least 256 bits (32 bytes) for HS256
/// - Store secrets in environment variables or secure vaults, never in code
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    /// Create a token issuer with the standard validity windows:
    /// 1 hour for access tokens, 15 days for refresh tokens.
    ///
    /// # Arguments
    /// * `secret` - Secret key for signing tokens
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttls(secret, Duration::hours(1), Duration::days(15))
    }

    /// Create a token issuer with explicit validity windows.
    pub fn with_ttls(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Validity window for a token purpose.
    pub fn ttl(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::Access => self.access_ttl,
            TokenPurpose::Refresh => self.refresh_ttl,
        }
    }

    /// Mint a signed token for a subject.
    ///
    /// # Arguments
    /// * `subject` - Identity id the token attests to
    /// * `purpose` - What the token may be used for; determines the TTL
    ///
    /// # Returns
    /// Signed token string, self-contained and tamper-evident
    ///
    /// # Errors
    /// * `EncodingFailed` - Token signing failed
    pub fn issue(&self, subject: &str, purpose: TokenPurpose) -> Result<String, TokenError> {
        let claims = Claims::new(subject, purpose, self.ttl(purpose));
        let header = Header::new(self.algorithm);

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::EncodingFailed(e.to_string()))
    }

    /// Verify a token and return its claims.
    ///
    /// Checks, in order: signature and shape, expiry (zero leeway), and that
    /// the token was minted for `expected_purpose`. A refresh token presented
    /// where an access token is expected fails, and vice versa.
    ///
    /// # Arguments
    /// * `token` - Token string to verify
    /// * `expected_purpose` - Purpose the caller will use the token for
    ///
    /// # Errors
    /// * `Invalid` - Malformed token or bad signature
    /// * `Expired` - Signature valid but the validity window has passed
    /// * `WrongPurpose` - Valid token minted for the other purpose
    pub fn verify(
        &self,
        token: &str,
        expected_purpose: TokenPurpose,
    ) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })?;

        let claims = token_data.claims;
        if claims.purpose != expected_purpose {
            return Err(TokenError::WrongPurpose {
                expected: expected_purpose,
                actual: claims.purpose,
            });
        }

        Ok(claims)
    }
}
