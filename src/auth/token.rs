use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::User;
use crate::error::{ImsError, ImsResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Ranger handle.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<Keys>,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, lifetime_secs: u64) -> Self {
        let lifetime_secs = i64::try_from(lifetime_secs).unwrap_or(i64::MAX / 1000);
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            }),
            lifetime: Duration::seconds(lifetime_secs),
        }
    }

    pub fn issue(&self, handle: &str) -> ImsResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + self.lifetime;
        let claims = Claims {
            sub: handle.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.keys.encoding)
            .map_err(|err| ImsError::Internal(format!("failed to sign token: {err}")))?;
        Ok((token, expires_at))
    }

    pub fn verify(&self, token: &str) -> ImsResult<User> {
        let data = decode::<Claims>(token, &self.keys.decoding, &Validation::default()).map_err(
            |err| {
                tracing::debug!(error = %err, "rejected bearer token");
                ImsError::NotAuthenticated
            },
        )?;
        Ok(User::new(data.claims.sub))
    }

    /// Resolve an `Authorization` header value to a user.
    pub fn authenticate(&self, header: Option<&str>) -> ImsResult<User> {
        let token = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ImsError::NotAuthenticated)?;
        self.verify(token)
    }
}
