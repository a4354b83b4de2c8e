//! Credential check and cookie sessions.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use shared::{LoginRequest, UserResponse};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::UserCredentials;
use crate::rest::AppState;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("No active session")]
    NoSession,
}

#[derive(Debug, Clone)]
struct Session {
    username: String,
    opened_at: Instant,
}

/// Known users and the sessions opened for them
#[derive(Clone)]
pub struct AuthService {
    users: Arc<HashMap<String, String>>,
    // session token -> session
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl AuthService {
    /// Sessions stop being valid `ttl` after login
    pub fn new(users: &[UserCredentials], ttl: Duration) -> Self {
        let users = users
            .iter()
            .map(|u| (u.username.clone(), u.password.clone()))
            .collect();
        Self {
            users: Arc::new(users),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, session: &Session) -> bool {
        session.opened_at.elapsed() >= self.ttl
    }

    /// Check credentials and open a session, returning its token
    pub async fn login(&self, request: &LoginRequest) -> Result<(String, UserResponse), AuthError> {
        match self.users.get(&request.username) {
            Some(password) if *password == request.password => {
                let token = Uuid::new_v4().to_string();
                let mut sessions = self.sessions.write().await;

                let before = sessions.len();
                sessions.retain(|_, session| !self.is_expired(session));
                if sessions.len() < before {
                    debug!("Dropped {} expired sessions", before - sessions.len());
                }

                sessions.insert(
                    token.clone(),
                    Session {
                        username: request.username.clone(),
                        opened_at: Instant::now(),
                    },
                );
                info!("User {} signed in", request.username);
                Ok((
                    token,
                    UserResponse {
                        username: request.username.clone(),
                    },
                ))
            }
            _ => {
                warn!("Rejected login for {:?}", request.username);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Close a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) {
        if let Some(session) = self.sessions.write().await.remove(token) {
            info!("User {} signed out", session.username);
        }
    }

    /// Username of a live session. Expired sessions are dropped.
    pub async fn user_for_token(&self, token: &str) -> Result<String, AuthError> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                None => return Err(AuthError::NoSession),
                Some(session) if !self.is_expired(session) => return Ok(session.username.clone()),
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(token) {
            if self.is_expired(session) {
                info!("Session of {} expired", session.username);
                sessions.remove(token);
            }
        }
        Err(AuthError::NoSession)
    }

    #[cfg(test)]
    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Session token from the `Cookie` header, if any
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
}

pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    )
}

pub fn expired_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// The signed-in user of a request; rejects with 401 otherwise
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or((StatusCode::UNAUTHORIZED, "Not signed in"))?;
        state
            .auth_service
            .user_for_token(&token)
            .await
            .map(CurrentUser)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Not signed in"))
    }
}
