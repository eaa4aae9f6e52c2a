/// Session token codec: signed claims carrying identity and team selection
use crate::{
    error::{YamoError, YamoResult},
    permission::{Principal, TeamClaim},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Signed token claims
///
/// `ver` is the issuing user's token version; the auth gate rejects tokens
/// whose version no longer matches the user row, which is how role changes
/// invalidate outstanding tokens without a revocation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    #[serde(flatten)]
    pub team: TeamClaim,
    pub ver: i64,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn principal(&self, is_superadmin: bool) -> Principal {
        Principal {
            user_id: self.sub,
            username: self.username.clone(),
            is_superadmin,
        }
    }
}

/// Issues and verifies session tokens. Pure apart from reading the clock.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Issue a signed token for a principal, with or without a team claim
    pub fn issue(
        &self,
        principal: &Principal,
        team: TeamClaim,
        token_version: i64,
    ) -> YamoResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.user_id,
            username: principal.username.clone(),
            team,
            ver: token_version,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| YamoError::Internal(format!("Token signing failed: {}", e)))
    }

    /// Verify signature and expiry, returning the embedded claims
    pub fn decode(&self, token: &str) -> YamoResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Allow some clock skew (5 minutes)
        validation.leeway = 300;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    YamoError::InvalidCredential("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    YamoError::InvalidCredential("Invalid token signature".to_string())
                }
                _ => YamoError::InvalidCredential(format!("Malformed token: {}", e)),
            })
    }
}
