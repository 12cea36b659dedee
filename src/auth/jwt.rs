//! HS256 tokens for sessions and password resets.
//!
//! Two kinds of token share one secret: session tokens sent as
//! `Authorization: Bearer`, and short-lived password-reset tokens mailed
//! to the user. The `purpose` claim keeps one from being used as the other.

use anyhow::{bail, Context, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    Reset,
}

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: `id_usuario` as a string
    pub sub: String,
    /// Login name
    pub usuario: String,
    pub id_rol: Option<i64>,
    pub purpose: TokenPurpose,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(
        id_usuario: i64,
        usuario: &str,
        id_rol: Option<i64>,
        purpose: TokenPurpose,
        expiry_secs: u64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: id_usuario.to_string(),
            usuario: usuario.to_string(),
            id_rol,
            purpose,
            iat: now,
            exp: now + expiry_secs as i64,
        }
    }

    pub fn id_usuario(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

pub fn encode_jwt(claims: &Claims, secret: &str) -> Result<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to encode JWT")
}

/// Decode and validate a JWT token.
///
/// Fails when the signature, expiry or purpose does not match.
pub fn decode_jwt(token: &str, secret: &str, purpose: TokenPurpose) -> Result<Claims> {
    let token_data: TokenData<Claims> = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .context("Failed to decode JWT")?;

    if token_data.claims.purpose != purpose {
        bail!("Token purpose mismatch");
    }
    Ok(token_data.claims)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-minimum-32-chars!!";

    #[test]
    fn test_encode_decode_roundtrip() {
        let claims = Claims::new(7, "maria", Some(1), TokenPurpose::Session, 3600);
        let token = encode_jwt(&claims, TEST_SECRET).expect("encode should succeed");

        let decoded =
            decode_jwt(&token, TEST_SECRET, TokenPurpose::Session).expect("decode should succeed");
        assert_eq!(decoded.id_usuario(), Some(7));
        assert_eq!(decoded.usuario, "maria");
        assert_eq!(decoded.id_rol, Some(1));
        assert_eq!(decoded.exp - decoded.iat, 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iat: now - 7200,
            exp: now - 3600,
            ..Claims::new(1, "bob", None, TokenPurpose::Session, 0)
        };
        let token = encode_jwt(&claims, TEST_SECRET).unwrap();

        assert!(decode_jwt(&token, TEST_SECRET, TokenPurpose::Session).is_err());
    }

    #[test]
    fn test_invalid_secret_rejected() {
        let claims = Claims::new(1, "carlos", None, TokenPurpose::Session, 3600);
        let token = encode_jwt(&claims, TEST_SECRET).unwrap();

        let result = decode_jwt(&token, "wrong-secret-that-is-also-32chars!", TokenPurpose::Session);
        assert!(result.is_err(), "wrong secret should be rejected");
    }

    #[test]
    fn test_reset_token_is_not_a_session() {
        let claims = Claims::new(3, "ana", None, TokenPurpose::Reset, 900);
        let token = encode_jwt(&claims, TEST_SECRET).unwrap();

        assert!(decode_jwt(&token, TEST_SECRET, TokenPurpose::Session).is_err());
        assert!(decode_jwt(&token, TEST_SECRET, TokenPurpose::Reset).is_ok());
    }

    #[test]
    fn test_malformed_token_rejected() {
        for token in ["not.a.valid.jwt", "", "just-random-text"] {
            assert!(decode_jwt(token, TEST_SECRET, TokenPurpose::Session).is_err());
        }
    }
}
