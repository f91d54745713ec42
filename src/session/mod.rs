mod fallback;
pub mod normalize;
pub mod store;

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::AppError;
use store::{SessionStore, StoredUser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Issuer,
}

/// Canonical user record, produced by the normalizer or restored from
/// durable storage. Field names on the wire match the backend's camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub cedula: String,
    pub nombre_completo: String,
    #[serde(default)]
    pub primer_nombre: String,
    #[serde(default)]
    pub segundo_nombre: String,
    #[serde(default)]
    pub primer_apellido: String,
    #[serde(default)]
    pub segundo_apellido: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/// In-memory session state. Loading and error are mutually exclusive:
/// starting a login raises `loading` and clears `error`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    pub user: Option<User>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Strips dot separators and whitespace from a raw cedula input.
pub fn clean_cedula(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '.' && !c.is_whitespace())
        .collect()
}

/// A valid cedula is 6 to 12 digits.
pub fn is_valid_cedula(cedula: &str) -> bool {
    static CEDULA_RE: OnceLock<Regex> = OnceLock::new();
    CEDULA_RE
        .get_or_init(|| Regex::new(r"^[0-9]{6,12}$").unwrap())
        .is_match(cedula)
}

/// Owns the single session and its durable storage. Held by the
/// application state; mutations go through these methods only.
pub struct SessionManager {
    current: RwLock<Session>,
    store: SessionStore,
}

impl SessionManager {
    pub fn new(store: SessionStore) -> Self {
        Self {
            current: RwLock::new(Session::default()),
            store,
        }
    }

    /// Runs once at startup: re-hydrates the session from durable storage.
    /// A corrupt entry is discarded and the session starts empty; this
    /// never errors back to the caller.
    pub async fn restore(&self) {
        match self.store.load_user() {
            StoredUser::Valid(user) => {
                info!(cedula = %user.cedula, "session restored");
                self.current.write().await.user = Some(user);
            }
            StoredUser::Corrupt => {
                warn!("discarding corrupt persisted session");
                self.store.clear_user();
            }
            StoredUser::Absent => {}
        }
    }

    /// Sanitizes the identifier, asks the backend, normalizes whatever
    /// shape comes back, and falls back to the fixed demo table when the
    /// backend is unreachable or its payload is beyond repair.
    pub async fn login(&self, api: &ApiClient, raw_cedula: &str) -> Result<User, AppError> {
        let cedula = clean_cedula(raw_cedula);
        {
            let mut session = self.current.write().await;
            session.loading = true;
            session.error = None;
        }

        let result = self.login_inner(api, &cedula).await;

        let mut session = self.current.write().await;
        session.loading = false;
        match &result {
            Ok(user) => {
                session.user = Some(user.clone());
                session.error = None;
            }
            Err(err) => {
                session.error = Some(err.user_message().to_string());
            }
        }
        result
    }

    async fn login_inner(&self, api: &ApiClient, cedula: &str) -> Result<User, AppError> {
        if !is_valid_cedula(cedula) {
            return Err(AppError::NotFound);
        }

        let (user, token) = match api.login(cedula).await {
            Ok(payload) => match normalize::normalize_auth(&payload, cedula) {
                Ok(auth) => (auth.user, auth.token),
                Err(err) => {
                    warn!(%err, "auth payload not normalizable, trying demo table");
                    (fallback::lookup(cedula).ok_or(AppError::NotFound)?, None)
                }
            },
            Err(err) => {
                warn!(%err, "backend login failed, trying demo table");
                (fallback::lookup(cedula).ok_or(AppError::NotFound)?, None)
            }
        };

        if let Err(err) = self.store.save_user(&user) {
            warn!(%err, "could not persist session user");
        }
        match token {
            Some(ref token) => {
                if let Err(err) = self.store.save_token(token) {
                    warn!(%err, "could not persist session token");
                }
            }
            None => self.store.clear_token(),
        }

        info!(cedula = %user.cedula, "login succeeded");
        Ok(user)
    }

    /// Clears the in-memory session and both storage keys. Server-side
    /// invalidation is best-effort and never blocks the local logout.
    pub async fn logout(&self, api: &ApiClient) {
        if let Some(token) = self.store.load_token() {
            if let Err(err) = api.logout(&token).await {
                warn!(%err, "server-side logout failed, clearing locally anyway");
            }
        }
        self.store.clear_all();
        *self.current.write().await = Session::default();
    }

    pub async fn clear_error(&self) {
        self.current.write().await.error = None;
    }

    pub async fn snapshot(&self) -> Session {
        self.current.read().await.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.current.read().await.user.clone()
    }

    /// Current bearer token, read from durable storage like every other
    /// consumer of the key.
    pub fn token(&self) -> Option<String> {
        self.store.load_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_api() -> ApiClient {
        // Nothing listens on port 9; connections fail immediately.
        ApiClient::new("http://127.0.0.1:9", Duration::from_millis(400))
    }

    fn manager(dir: &std::path::Path) -> SessionManager {
        SessionManager::new(SessionStore::open(dir).expect("open store"))
    }

    #[test]
    fn clean_cedula_is_idempotent() {
        let cleaned = clean_cedula(" 1.234.567.890 ");
        assert_eq!(cleaned, "1234567890");
        assert_eq!(clean_cedula(&cleaned), cleaned);
        assert!(is_valid_cedula(&cleaned));
    }

    #[test]
    fn cedula_validation_bounds() {
        assert!(is_valid_cedula("123456"));
        assert!(is_valid_cedula("123456789012"));
        assert!(!is_valid_cedula("12345"));
        assert!(!is_valid_cedula("1234567890123"));
        assert!(!is_valid_cedula("12345678a"));
        assert!(!is_valid_cedula(""));
    }

    #[tokio::test]
    async fn login_against_the_demo_table_returns_the_seeded_user() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sessions = manager(dir.path());

        let user = sessions
            .login(&unreachable_api(), "1.234.567.890")
            .await
            .expect("fallback login");
        assert_eq!(user.cedula, "1234567890");
        assert_eq!(user.nombre_completo, "Juan Carlos Pérez Rodríguez");

        let snapshot = sessions.snapshot().await;
        assert!(!snapshot.loading);
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.user, Some(user));
    }

    #[tokio::test]
    async fn unknown_cedula_sets_a_retryable_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sessions = manager(dir.path());

        let err = sessions
            .login(&unreachable_api(), "5555555555")
            .await
            .expect_err("no such user");
        assert!(matches!(err, AppError::NotFound));

        let snapshot = sessions.snapshot().await;
        assert!(snapshot.user.is_none());
        assert!(!snapshot.loading);
        assert_eq!(snapshot.error.as_deref(), Some("Cédula no encontrada"));

        sessions.clear_error().await;
        assert!(sessions.snapshot().await.error.is_none());
    }

    #[tokio::test]
    async fn invalid_cedula_short_circuits_to_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sessions = manager(dir.path());
        let err = sessions
            .login(&unreachable_api(), "12a")
            .await
            .expect_err("invalid format");
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn logout_clears_storage_and_restore_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let api = unreachable_api();

        let sessions = manager(dir.path());
        sessions
            .login(&api, "1234567890")
            .await
            .expect("fallback login");
        assert!(sessions.user().await.is_some());

        sessions.logout(&api).await;
        assert!(sessions.user().await.is_none());
        assert!(sessions.token().is_none());

        let fresh = manager(dir.path());
        fresh.restore().await;
        assert!(fresh.user().await.is_none());
    }

    #[tokio::test]
    async fn restore_discards_a_corrupt_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("user.json"), "{broken").expect("write");

        let sessions = manager(dir.path());
        sessions.restore().await;
        assert!(sessions.user().await.is_none());
        // the corrupt entry is gone, not just ignored
        assert!(!dir.path().join("user.json").exists());
    }

    #[tokio::test]
    async fn restore_rehydrates_a_valid_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let api = unreachable_api();

        let sessions = manager(dir.path());
        sessions.login(&api, "9876543210").await.expect("login");

        let fresh = manager(dir.path());
        fresh.restore().await;
        let user = fresh.user().await.expect("restored user");
        assert_eq!(user.nombre_completo, "María Fernanda López García");
    }
}
