use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::models::{Claims, TokenType};

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

pub fn generate_access_token(
    user_id: u64,
    email: String,
    name: String,
    role: u8,
    secret: &str,
    ttl: usize,
) -> String {
    let claims = Claims {
        user_id,
        sub: email,
        name,
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type: TokenType::Access,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn generate_refresh_token(
    user_id: u64,
    email: String,
    name: String,
    role: u8,
    secret: &str,
    ttl: usize,
) -> (String, Claims) {
    let claims = Claims {
        user_id,
        sub: email,
        name,
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type: TokenType::Refresh,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();

    (token, claims)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_round_trip() {
        let token = generate_access_token(
            7,
            "user@example.com".to_string(),
            "A User".to_string(),
            2,
            "test-secret",
            3600,
        );
        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "user@example.com");
        assert_eq!(claims.name, "A User");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = generate_access_token(
            7,
            "user@example.com".to_string(),
            "A User".to_string(),
            2,
            "test-secret",
            3600,
        );
        assert!(verify_token(&token, "other-secret").is_err());
    }
}
