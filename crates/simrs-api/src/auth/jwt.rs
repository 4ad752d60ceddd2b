//! 토큰 코덱.
//!
//! Access Token / Refresh Token 발급 및 검증. 순수 함수이며 I/O가 없습니다.
//! 서명과 만료만 검사합니다. 폐기 여부는 토큰에 담기지 않으므로
//! 보호된 요청마다 세션 저장소에서 확인해야 합니다.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// 토큰 종류. 액세스 자리에 리프레시 토큰을 쓰거나 그 반대는 거부됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT 페이로드.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 ID
    pub sub: Uuid,
    /// 세션 ID
    pub sid: Uuid,
    /// 토큰 종류
    pub typ: TokenKind,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID. 같은 초에 발급된 토큰도 서로 다르게 만듭니다.
    pub jti: Uuid,
}

impl Claims {
    fn new(user_id: Uuid, session_id: Uuid, typ: TokenKind, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            sid: session_id,
            typ,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4(),
        }
    }

    /// 만료 시각.
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }
}

/// 검증된 토큰에서 추출한 신원 정보.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// 발급된 단일 토큰.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Access Token + Refresh Token 페어.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// 항상 "Bearer"
    pub token_type: String,
    /// Access Token 만료 시각
    pub expires_at: DateTime<Utc>,
    /// Access Token 남은 수명 (초)
    pub expires_in: i64,
    /// Refresh Token 만료 시각
    pub refresh_expires_at: DateTime<Utc>,
}

/// 토큰 코덱 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("유효하지 않은 토큰")]
    Invalid,
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// 서버 비밀 키로 토큰을 서명/검증합니다.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// 새 코덱을 생성합니다.
    pub fn new(secret: &SecretString, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    /// 설정 값(분/일)으로 코덱을 생성합니다.
    pub fn from_config(config: &simrs_core::JwtConfig) -> Self {
        Self::new(
            &config.secret,
            Duration::minutes(config.access_ttl_minutes),
            Duration::days(config.refresh_ttl_days),
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<IssuedToken, JwtError> {
        self.issue(Claims::new(user_id, session_id, TokenKind::Access, self.access_ttl))
    }

    pub fn issue_refresh_token(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<IssuedToken, JwtError> {
        self.issue(Claims::new(user_id, session_id, TokenKind::Refresh, self.refresh_ttl))
    }

    /// Access + Refresh 토큰 쌍을 발급합니다.
    pub fn issue_pair(&self, user_id: Uuid, session_id: Uuid) -> Result<TokenPair, JwtError> {
        let access = self.issue_access_token(user_id, session_id)?;
        let refresh = self.issue_refresh_token(user_id, session_id)?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_at: access.expires_at,
            expires_in: self.access_ttl.num_seconds(),
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Access Token 검증.
    pub fn validate_access(&self, token: &str) -> Result<VerifiedToken, JwtError> {
        self.validate(token, TokenKind::Access)
    }

    /// Refresh Token 검증.
    pub fn validate_refresh(&self, token: &str) -> Result<VerifiedToken, JwtError> {
        self.validate(token, TokenKind::Refresh)
    }

    fn issue(&self, claims: Claims) -> Result<IssuedToken, JwtError> {
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    fn validate(&self, token: &str, expected: TokenKind) -> Result<VerifiedToken, JwtError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid,
            }
        })?;

        let claims = data.claims;
        if claims.typ != expected {
            return Err(JwtError::Invalid);
        }

        Ok(VerifiedToken {
            user_id: claims.sub,
            session_id: claims.sid,
            expires_at: claims.expires_at(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            &SecretString::from("test-secret-key-for-jwt-testing-minimum-32-chars".to_string()),
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    #[test]
    fn test_issue_and_validate_access() {
        let codec = codec();
        let (user, session) = (Uuid::new_v4(), Uuid::new_v4());

        let issued = codec.issue_access_token(user, session).unwrap();
        let verified = codec.validate_access(&issued.token).unwrap();

        assert_eq!(verified.user_id, user);
        assert_eq!(verified.session_id, session);
        assert_eq!(verified.expires_at, issued.expires_at);
    }

    #[test]
    fn test_pair_has_distinct_lifetimes() {
        let codec = codec();
        let pair = codec.issue_pair(Uuid::new_v4(), Uuid::new_v4()).unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 15 * 60);
        assert!(pair.refresh_expires_at > pair.expires_at);
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[test]
    fn test_same_second_refresh_tokens_differ() {
        let codec = codec();
        let (user, session) = (Uuid::new_v4(), Uuid::new_v4());

        let a = codec.issue_refresh_token(user, session).unwrap();
        let b = codec.issue_refresh_token(user, session).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_token_kind_is_enforced() {
        let codec = codec();
        let pair = codec.issue_pair(Uuid::new_v4(), Uuid::new_v4()).unwrap();

        assert!(matches!(codec.validate_access(&pair.refresh_token), Err(JwtError::Invalid)));
        assert!(matches!(codec.validate_refresh(&pair.access_token), Err(JwtError::Invalid)));
        assert!(codec.validate_refresh(&pair.refresh_token).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let codec = codec();
        let mut claims = Claims::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            TokenKind::Access,
            Duration::minutes(15),
        );
        claims.iat -= 3600;
        claims.exp = Utc::now().timestamp() - 10;
        let issued = codec.issue(claims).unwrap();

        assert!(matches!(codec.validate_access(&issued.token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_garbage_and_wrong_secret() {
        let codec = codec();
        assert!(matches!(codec.validate_access("invalid.token.here"), Err(JwtError::Invalid)));

        let other = TokenCodec::new(
            &SecretString::from("another-secret-key-for-testing-minimum-32-chars".to_string()),
            Duration::minutes(15),
            Duration::days(7),
        );
        let issued = other.issue_access_token(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert!(matches!(codec.validate_access(&issued.token), Err(JwtError::Invalid)));
    }
}
