use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use argon2::password_hash::rand_core::RngCore;
use sha2::{Digest, Sha256};

pub fn hash_password(password: &str) -> String {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    argon2
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

pub fn verify_password(password: &str, hashed: &str) -> Result<(), argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let parsed = PasswordHash::new(hashed)?;

    argon2.verify_password(password.as_bytes(), &parsed)
}

/// 32 random bytes, hex-encoded. Only its SHA-256 hash is stored.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let hashed = hash_password("correct horse battery");
        assert!(verify_password("correct horse battery", &hashed).is_ok());
        assert!(verify_password("wrong password", &hashed).is_err());
    }

    #[test]
    fn test_reset_token_shape() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_reset_token());

        let digest = hash_reset_token(&token);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_reset_token(&token));
    }
}
