use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// Signs and verifies the two token kinds. Access and refresh tokens use
/// separate HMAC secrets, so one kind never verifies as the other.
#[derive(Clone)]
pub struct JwtService {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Claims for access tokens (short-lived)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub jti: String,
}

/// Claims for refresh tokens, bound to one device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Random per token, so two tokens minted in the same second still differ
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

impl RefreshTokenClaims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        if config.access_token_secret.is_empty() || config.refresh_token_secret.is_empty() {
            return Err(anyhow::anyhow!("JWT secrets must not be empty"));
        }
        if config.access_token_secret == config.refresh_token_secret {
            return Err(anyhow::anyhow!(
                "Access and refresh tokens must be signed with different secrets"
            ));
        }

        tracing::info!("JWT service initialized with HS256 secrets");

        Ok(Self {
            access_encoding_key: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding_key: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_encoding_key: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        })
    }

    pub fn create_access_token(&self, user_id: &str) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    pub fn create_refresh_token(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(self.refresh_token_expiry_days);

        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            device_id: device_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh token: {}", e))
    }

    /// `None` for anything that is not a live access token signed by us.
    pub fn verify_access_token(&self, token: &str) -> Option<AccessTokenClaims> {
        decode::<AccessTokenClaims>(token, &self.access_decoding_key, &strict_validation())
            .map(|data| data.claims)
            .map_err(|e| tracing::debug!(error = %e, "Access token rejected"))
            .ok()
    }

    /// `None` for anything that is not a live refresh token signed by us.
    pub fn verify_refresh_token(&self, token: &str) -> Option<RefreshTokenClaims> {
        decode::<RefreshTokenClaims>(token, &self.refresh_decoding_key, &strict_validation())
            .map(|data| data.claims)
            .map_err(|e| tracing::debug!(error = %e, "Refresh token rejected"))
            .ok()
    }

    /// Signature-checked decode that tolerates expiry. Only for logout paths,
    /// which match the token by hash and never mint anything from it.
    pub fn decode_refresh_token_for_cleanup(&self, token: &str) -> Option<RefreshTokenClaims> {
        let mut validation = strict_validation();
        validation.validate_exp = false;

        decode::<RefreshTokenClaims>(token, &self.refresh_decoding_key, &validation)
            .map(|data| data.claims)
            .ok()
    }

    pub fn refresh_token_max_age_seconds(&self) -> i64 {
        self.refresh_token_expiry_days * 24 * 60 * 60
    }
}

fn strict_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation
}
