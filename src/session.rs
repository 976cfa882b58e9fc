use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::credentials::Credentials;

pub const SESSION_COOKIE: &str = "auprint_session";

/// Server-side login state for one browser session. Only `id` ever leaves
/// the server.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub credentials: Credentials,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with a unique ID and current timestamp
    pub fn new(credentials: Credentials) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            credentials,
            created_at: Utc::now(),
        }
    }

    /// Whether the session is at least `ttl` old.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        match Utc::now().signed_duration_since(self.created_at).to_std() {
            Ok(age) => age >= ttl,
            // Created in the future, so clock skew
            Err(_) => false,
        }
    }
}

/// Live login sessions. Sessions older than the lifetime are dropped.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Stores the credentials under a fresh session id and returns the id.
    /// Expired sessions are pruned first.
    pub async fn create(&self, credentials: Credentials) -> String {
        let session = Session::new(credentials);
        let id = session.id.clone();

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(self.ttl));
        if sessions.len() < before {
            debug!("Pruned {} expired sessions", before - sessions.len());
        }
        sessions.insert(id.clone(), session);
        id
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions
            .read()
            .await
            .get(id)
            .filter(|session| !session.is_expired(self.ttl))
            .cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn creds() -> Credentials {
        Credentials::new("au123456", "pw").unwrap()
    }

    async fn insert_backdated(store: &SessionStore, age: chrono::Duration) -> String {
        let mut session = Session::new(creds());
        session.created_at = Utc::now() - age;
        let id = session.id.clone();
        store.sessions.write().await.insert(id.clone(), session);
        id
    }

    #[test]
    fn test_new_session() {
        let session = Session::new(creds());
        assert!(!session.id.is_empty());
        assert!(Uuid::parse_str(&session.id).is_ok());
        assert_eq!(session.credentials.auid, "au123456");
    }

    #[tokio::test]
    async fn test_store_create_get_remove() {
        let store = SessionStore::new(TTL);
        assert!(store.is_empty().await);

        let id = store.create(creds()).await;
        let session = store.get(&id).await.expect("session stored");
        assert_eq!(session.credentials, creds());

        assert!(store.remove(&id).await.is_some());
        assert!(store.get(&id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let store = SessionStore::new(TTL);
        let a = store.create(creds()).await;
        let b = store.create(creds()).await;
        assert_ne!(a, b);
        assert_eq!(store.len().await, 2);
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session::new(creds());
        assert!(!session.is_expired(TTL));

        session.created_at = Utc::now() - chrono::Duration::seconds(120);
        assert!(session.is_expired(TTL));
    }

    #[tokio::test]
    async fn test_expired_session_is_not_returned() {
        let store = SessionStore::new(TTL);
        let old = insert_backdated(&store, chrono::Duration::seconds(120)).await;
        let fresh = insert_backdated(&store, chrono::Duration::seconds(10)).await;

        assert!(store.get(&old).await.is_none());
        assert!(store.get(&fresh).await.is_some());
    }

    #[tokio::test]
    async fn test_create_prunes_expired_sessions() {
        let store = SessionStore::new(TTL);
        let old = insert_backdated(&store, chrono::Duration::seconds(120)).await;
        assert_eq!(store.len().await, 1);

        let id = store.create(creds()).await;
        assert_eq!(store.len().await, 1);
        assert!(store.sessions.read().await.get(&old).is_none());
        assert!(store.get(&id).await.is_some());
    }
}
