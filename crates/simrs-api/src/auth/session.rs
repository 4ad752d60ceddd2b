//! 로그인 세션 수명 주기.
//!
//! 생성(로그인), 활동 갱신, 리프레시 토큰 교체, 단일/일괄 폐기, 목록 조회를 담당합니다.
//! 저장소에는 리프레시 토큰 원문이 아닌 SHA-256 해시만 기록합니다.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use simrs_core::{LoginSession, SessionStore, StoreResult, UserStore};
use uuid::Uuid;

use super::error::AuthError;
use super::jwt::{TokenCodec, TokenPair};

/// 리프레시 토큰 지문 (SHA-256 hex).
pub fn refresh_token_fingerprint(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// 새로 생성되었거나 토큰이 재발급된 세션.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: LoginSession,
    pub tokens: TokenPair,
}

/// 세션 관리자.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    codec: TokenCodec,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        codec: TokenCodec,
    ) -> Self {
        Self {
            sessions,
            users,
            codec,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// 세션을 생성하고 토큰 쌍을 발급합니다.
    pub async fn create_session(
        &self,
        user_id: Uuid,
        device_info: Option<String>,
        client_addr: Option<String>,
    ) -> Result<IssuedSession, AuthError> {
        let mut session = LoginSession::new(user_id, String::new(), device_info, client_addr);
        let tokens = self.codec.issue_pair(user_id, session.id)?;
        session.refresh_token_hash = refresh_token_fingerprint(&tokens.refresh_token);

        self.sessions.insert(&session).await?;

        tracing::info!(user_id = %user_id, session_id = %session.id, "Session created");
        Ok(IssuedSession { session, tokens })
    }

    pub async fn get_session(&self, session_id: Uuid) -> StoreResult<Option<LoginSession>> {
        self.sessions.find_by_id(session_id).await
    }

    pub fn is_active(session: &LoginSession) -> bool {
        session.is_active()
    }

    /// 리프레시 토큰으로 새 토큰 쌍을 발급합니다.
    ///
    /// 성공하면 저장된 해시가 교체되어 이전 리프레시 토큰은 다시 사용할 수 없습니다.
    pub async fn refresh_tokens(&self, raw_refresh_token: &str) -> Result<IssuedSession, AuthError> {
        let verified = self
            .codec
            .validate_refresh(raw_refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let presented_hash = refresh_token_fingerprint(raw_refresh_token);
        let mut session = self
            .sessions
            .find_by_refresh_hash(&presented_hash)
            .await?
            .filter(|s| s.id == verified.session_id)
            .ok_or(AuthError::InvalidRefreshToken)?;

        if !session.is_active() {
            return Err(AuthError::SessionRevoked);
        }

        let user = self.users.find_by_id(session.user_id).await?;
        if !user.is_some_and(|u| u.is_active) {
            return Err(AuthError::UserInactive);
        }

        let tokens = self.codec.issue_pair(session.user_id, session.id)?;
        let new_hash = refresh_token_fingerprint(&tokens.refresh_token);

        let rotated = self
            .sessions
            .rotate_refresh_hash(session.id, &presented_hash, &new_hash)
            .await?;
        if !rotated {
            tracing::warn!(session_id = %session.id, "Concurrent refresh token redemption rejected");
            return Err(AuthError::InvalidRefreshToken);
        }

        session.refresh_token_hash = new_hash;
        tracing::debug!(session_id = %session.id, "Refresh token rotated");
        Ok(IssuedSession { session, tokens })
    }

    /// 세션을 폐기합니다. 이미 폐기되었거나 없으면 `SessionNotFound`.
    pub async fn revoke(&self, session_id: Uuid) -> Result<(), AuthError> {
        if self.sessions.revoke(session_id, Utc::now()).await? {
            tracing::info!(session_id = %session_id, "Session revoked");
            Ok(())
        } else {
            Err(AuthError::SessionNotFound)
        }
    }

    /// 사용자의 모든 활성 세션을 폐기합니다. 폐기된 수를 반환합니다.
    pub async fn revoke_all(&self, user_id: Uuid) -> StoreResult<u64> {
        let count = self.sessions.revoke_all_by_user(user_id, Utc::now()).await?;
        tracing::info!(user_id = %user_id, count, "All sessions revoked");
        Ok(count)
    }

    pub async fn list_active(&self, user_id: Uuid) -> StoreResult<Vec<LoginSession>> {
        self.sessions.list_by_user(user_id, true).await
    }

    pub async fn list_all(&self, user_id: Uuid) -> StoreResult<Vec<LoginSession>> {
        self.sessions.list_by_user(user_id, false).await
    }

    /// 마지막 활동 시간 갱신. 요청 경로 밖에서 호출됩니다.
    pub async fn touch_last_seen(&self, session_id: Uuid) -> StoreResult<()> {
        self.sessions.update_last_seen(session_id, Utc::now()).await
    }
}
