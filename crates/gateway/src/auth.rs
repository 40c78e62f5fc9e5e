//! Bearer token verification.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Numeric user id, as issued by the token service.
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Verifies HS256 identity tokens and yields the user id they carry.
pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    pub fn verify(&self, token: &str) -> GatewayResult<i64> {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|err| GatewayError::AuthenticationFailed(format!("Invalid token: {err}")))?;

        data.claims.sub.parse::<i64>().map_err(|_| {
            GatewayError::AuthenticationFailed("Token subject is not a user id".to_string())
        })
    }

    /// Sign a token for `user_id`. Used by tooling and tests.
    pub fn issue(&self, user_id: i64, ttl: Duration) -> GatewayResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| GatewayError::InternalError("System time error".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + ttl).as_secs() as usize,
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| GatewayError::InternalError(format!("Failed to encode token: {err}")))
    }
}
