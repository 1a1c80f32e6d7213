//! Gate that resolves the signed-in identity before any store loads.

use std::future::Future;

use crate::auth::{AuthResult, AuthSession, SessionPersistence, SupabaseAuthClient};
use crate::models::UserId;

/// Something that can produce the current session, if any.
pub trait SessionSource: Send + Sync {
    fn current_session(&self) -> impl Future<Output = AuthResult<Option<AuthSession>>> + Send;
}

impl<S: SessionPersistence> SessionSource for SupabaseAuthClient<S> {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        self.restore_session().await
    }
}

/// A fixed session, for demo mode and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSession(pub Option<AuthSession>);

impl SessionSource for StaticSession {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self.0.clone())
    }
}

/// Who the resource views load data for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Authenticated(Identity, AuthSession),
    SignInRequired,
}

impl GateOutcome {
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity, _) => Some(identity),
            Self::SignInRequired => None,
        }
    }
}

pub struct SessionGate<S> {
    source: S,
}

impl<S: SessionSource> SessionGate<S> {
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Resolve the session. Lookup failures send the user to sign in.
    pub async fn resolve(&self) -> GateOutcome {
        match self.source.current_session().await {
            Ok(Some(session)) => {
                let identity = Identity {
                    user_id: session.user.id.clone(),
                    email: session.user.email.clone(),
                };
                tracing::debug!("Session resolved for {}", identity.user_id);
                GateOutcome::Authenticated(identity, session)
            }
            Ok(None) => GateOutcome::SignInRequired,
            Err(error) => {
                tracing::warn!("Could not resolve session: {}", error);
                GateOutcome::SignInRequired
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, AuthUser, MemorySessionStore};
    use crate::config::ProjectEndpoints;
    use crate::util::unix_timestamp_now;

    fn session() -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: unix_timestamp_now() + 3600,
            user: AuthUser {
                id: UserId::new("user-1"),
                email: Some("me@example.com".to_string()),
            },
        }
    }

    struct FailingSource;

    impl SessionSource for FailingSource {
        async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
            Err(AuthError::SessionStorage("keychain locked".to_string()))
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn present_session_authenticates() {
        let outcome = SessionGate::new(StaticSession(Some(session()))).resolve().await;
        assert_eq!(
            outcome.identity(),
            Some(&Identity {
                user_id: UserId::new("user-1"),
                email: Some("me@example.com".to_string()),
            })
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_or_failing_session_requires_sign_in() {
        assert_eq!(
            SessionGate::new(StaticSession(None)).resolve().await,
            GateOutcome::SignInRequired
        );
        assert_eq!(
            SessionGate::new(FailingSource).resolve().await,
            GateOutcome::SignInRequired
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn auth_client_restores_persisted_session() {
        let store = MemorySessionStore::default();
        store.save_session(&session()).unwrap();
        let endpoints = ProjectEndpoints::new("https://demo.supabase.co", "anon").unwrap();
        let client = SupabaseAuthClient::new(&endpoints, store).unwrap();

        let outcome = SessionGate::new(client).resolve().await;
        assert!(matches!(outcome, GateOutcome::Authenticated(_, ref s) if s.access_token == "access"));
    }
}
