use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims carried by access tokens from the identity service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Decode and verify an HS256 token against the shared secret.
/// Expiry is validated by the decoder.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(sub: &str, exp_offset_secs: i64, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            iat: now,
            exp: now + exp_offset_secs,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_round_trips() {
        let token = mint("1f1e9bbc-9ac8-4f0a-9c23-bf0f2bdca2a0", 3600, "s3cr3t");
        let claims = verify_token(&token, "s3cr3t").unwrap();
        assert_eq!(claims.sub, "1f1e9bbc-9ac8-4f0a-9c23-bf0f2bdca2a0");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint("user", 3600, "s3cr3t");
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the decoder's default leeway.
        let token = mint("user", -3600, "s3cr3t");
        assert!(verify_token(&token, "s3cr3t").is_err());
    }
}
