use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorMessage, HttpError},
    models::usermodel::{User, UserRole},
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Identity and role travel in the token so request authorization needs no store lookup.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    pub is_staff: bool,
    pub is_agent: bool,
    pub token_type: TokenType,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub fn create_token(
    user: &User,
    token_type: TokenType,
    secret: &[u8],
    expires_in_minutes: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    if secret.is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidKeyFormat.into());
    }

    let now = Utc::now();
    let iat = now.timestamp() as usize;
    let exp = (now + Duration::minutes(expires_in_minutes)).timestamp() as usize;
    let claims = TokenClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role,
        is_staff: user.role.is_staff(),
        is_agent: user.role.is_agent(),
        token_type,
        iat,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

pub fn create_token_pair(
    user: &User,
    secret: &[u8],
    access_maxage: i64,
    refresh_maxage: i64,
) -> Result<TokenPair, jsonwebtoken::errors::Error> {
    Ok(TokenPair {
        access: create_token(user, TokenType::Access, secret, access_maxage)?,
        refresh: create_token(user, TokenType::Refresh, secret, refresh_maxage)?,
    })
}

pub fn decode_token<T: Into<String>>(
    token: T,
    secret: &[u8],
    expected: TokenType,
) -> Result<TokenClaims, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) if token.claims.token_type == expected => Ok(token.claims),
        _ => Err(HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "agent@example.com".to_string(),
            username: "agent".to_string(),
            first_name: "Ada".to_string(),
            last_name: String::new(),
            password: String::new(),
            role,
            is_active: true,
            date_joined: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_claims_carry_role_flags() {
        let agent = user(UserRole::Agent);
        let pair = create_token_pair(&agent, b"secret", 60, 120).unwrap();

        let claims = decode_token(pair.access, b"secret", TokenType::Access).unwrap();
        assert_eq!(claims.sub, agent.id.to_string());
        assert_eq!(claims.email, "agent@example.com");
        assert_eq!(claims.role, UserRole::Agent);
        assert!(claims.is_agent);
        assert!(!claims.is_staff);
    }

    #[test]
    fn test_token_type_is_enforced() {
        let admin = user(UserRole::Admin);
        let pair = create_token_pair(&admin, b"secret", 60, 120).unwrap();

        assert!(decode_token(pair.refresh.clone(), b"secret", TokenType::Access).is_err());
        assert!(decode_token(pair.access.clone(), b"secret", TokenType::Refresh).is_err());
        assert!(decode_token(pair.refresh, b"secret", TokenType::Refresh).unwrap().is_staff);
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired() {
        let customer = user(UserRole::Customer);

        let token = create_token(&customer, TokenType::Access, b"secret", 60).unwrap();
        assert!(decode_token(token, b"other", TokenType::Access).is_err());

        let expired = create_token(&customer, TokenType::Access, b"secret", -10).unwrap();
        assert!(decode_token(expired, b"secret", TokenType::Access).is_err());
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let customer = user(UserRole::Customer);
        assert!(create_token(&customer, TokenType::Access, b"", 60).is_err());
    }
}
