//! LiveKit Room Access Tokens

use livekit_api::access_token::{AccessToken, AccessTokenError, VideoGrants};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

fn default_token_ttl_seconds() -> u64 {
    3600
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("LiveKit access token error: {0}")]
    LiveKit(#[from] AccessTokenError),
}

/// Server-held LiveKit credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    pub url: String,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    /// Lifetime of issued tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }

    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }
}

/// Who is joining which room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub identity: String,
    pub name: String,
    pub room: String,
}

/// Mints signed join tokens from `LiveKitConfig` credentials.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    config: LiveKitConfig,
}

impl TokenIssuer {
    pub fn new(config: LiveKitConfig) -> Self {
        Self { config }
    }

    /// The LiveKit server URL clients should connect to.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn issue(&self, request: &JoinRequest) -> Result<String, TokenError> {
        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(&request.identity)
            .with_name(&request.name)
            .with_grants(VideoGrants {
                room_join: true,
                room: request.room.clone(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        Ok(token.to_jwt()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

    const SECRET: &str = "test-secret-that-is-long-enough";

    #[derive(Deserialize)]
    struct Claims {
        sub: String,
        name: String,
        iss: String,
        video: VideoClaims,
    }

    #[derive(Deserialize)]
    struct VideoClaims {
        room: String,
        #[serde(rename = "roomJoin")]
        room_join: bool,
    }

    #[test]
    fn test_issue_binds_identity_and_room() {
        let issuer = TokenIssuer::new(LiveKitConfig::new("wss://example.livekit.cloud", "devkey", SECRET));
        let request = JoinRequest {
            identity: "identity".into(),
            name: "name".into(),
            room: "my-room".into(),
        };

        let token = issuer.issue(&request).expect("token should be issued");
        let key = DecodingKey::from_secret(SECRET.as_bytes());
        let data = decode::<Claims>(&token, &key, &Validation::new(Algorithm::HS256))
            .expect("token should verify with the secret");

        assert_eq!(data.claims.sub, "identity");
        assert_eq!(data.claims.name, "name");
        assert_eq!(data.claims.iss, "devkey");
        assert_eq!(data.claims.video.room, "my-room");
        assert!(data.claims.video.room_join);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenIssuer::new(LiveKitConfig::new("ws://localhost:7880", "devkey", SECRET));
        let token = issuer
            .issue(&JoinRequest {
                identity: "a".into(),
                name: "A".into(),
                room: "r".into(),
            })
            .unwrap();

        let key = DecodingKey::from_secret(b"some-other-secret");
        assert!(decode::<Claims>(&token, &key, &Validation::new(Algorithm::HS256)).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = LiveKitConfig::new("ws://localhost:7880", "devkey", SECRET).with_ttl(60);
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("60"));
    }
}
