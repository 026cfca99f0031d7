use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,       // user id
    pub national_id: String,
    pub role: UserRole,
    pub assigned_bus_id: Option<Uuid>,
    pub exp: i64,        // expiration timestamp
    pub iat: i64,        // issued at timestamp
}

pub fn create_token(user: &user::Model, secret: &str, expiration_hours: i64) -> AppResult<String> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: user.id,
        national_id: user.national_id.clone(),
        role: user.role,
        assigned_bus_id: user.assigned_bus_id,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            full_name: "Carlos Ruiz".to_string(),
            national_id: "1020304050".to_string(),
            email: "carlos@example.com".to_string(),
            password_hash: String::new(),
            role: UserRole::Worker,
            assigned_bus_id: Some(Uuid::new_v4()),
            is_active: true,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_token_round_trip_keeps_scope() {
        let user = worker();
        let token = create_token(&user, "secret", 1).unwrap();
        let claims = verify_token(&token, "secret").unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, UserRole::Worker);
        assert_eq!(claims.assigned_bus_id, user.assigned_bus_id);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = create_token(&worker(), "secret", 1).unwrap();
        let err = verify_token(&token, "other").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
