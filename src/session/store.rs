use std::path::{Path, PathBuf};

use super::User;

const USER_KEY: &str = "user.json";
const TOKEN_KEY: &str = "token";

/// Outcome of reading the persisted user entry. A corrupt entry is kept
/// distinct from an absent one so the caller can discard it explicitly.
#[derive(Debug)]
pub enum StoredUser {
    Absent,
    Corrupt,
    Valid(User),
}

/// Durable session storage: one file for the serialized user, a separate
/// file for the opaque bearer token.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn user_path(&self) -> PathBuf {
        self.dir.join(USER_KEY)
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_KEY)
    }

    pub fn load_user(&self) -> StoredUser {
        let raw = match std::fs::read_to_string(self.user_path()) {
            Ok(raw) => raw,
            Err(_) => return StoredUser::Absent,
        };
        match serde_json::from_str::<User>(&raw) {
            Ok(user) if super::is_valid_cedula(&user.cedula) => StoredUser::Valid(user),
            _ => StoredUser::Corrupt,
        }
    }

    pub fn save_user(&self, user: &User) -> std::io::Result<()> {
        let raw = serde_json::to_string(user)?;
        std::fs::write(self.user_path(), raw)
    }

    pub fn clear_user(&self) {
        let _ = std::fs::remove_file(self.user_path());
    }

    pub fn load_token(&self) -> Option<String> {
        std::fs::read_to_string(self.token_path())
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    pub fn save_token(&self, token: &str) -> std::io::Result<()> {
        std::fs::write(self.token_path(), token)
    }

    pub fn clear_token(&self) {
        let _ = std::fs::remove_file(self.token_path());
    }

    pub fn clear_all(&self) {
        self.clear_user();
        self.clear_token();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::User;

    fn demo_user() -> User {
        User {
            cedula: "1234567890".into(),
            nombre_completo: "Juan Carlos Pérez Rodríguez".into(),
            primer_nombre: "Juan".into(),
            segundo_nombre: "Carlos".into(),
            primer_apellido: "Pérez".into(),
            segundo_apellido: "Rodríguez".into(),
            email: Some("juan.perez@email.com".into()),
            role: None,
        }
    }

    #[test]
    fn load_user_reports_absent_on_fresh_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path()).expect("open store");
        assert!(matches!(store.load_user(), StoredUser::Absent));
        assert!(store.load_token().is_none());
    }

    #[test]
    fn save_then_load_round_trips_the_user() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path()).expect("open store");
        store.save_user(&demo_user()).expect("save user");
        match store.load_user() {
            StoredUser::Valid(user) => assert_eq!(user, demo_user()),
            other => panic!("expected valid user, got {:?}", other),
        }
    }

    #[test]
    fn load_user_reports_corrupt_on_bad_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path()).expect("open store");
        std::fs::write(dir.path().join(USER_KEY), "{not json").expect("write");
        assert!(matches!(store.load_user(), StoredUser::Corrupt));
    }

    #[test]
    fn user_with_invalid_cedula_counts_as_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path()).expect("open store");
        let mut user = demo_user();
        user.cedula = "12ab".into();
        let raw = serde_json::to_string(&user).expect("serialize");
        std::fs::write(dir.path().join(USER_KEY), raw).expect("write");
        assert!(matches!(store.load_user(), StoredUser::Corrupt));
    }

    #[test]
    fn clear_all_removes_both_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(dir.path()).expect("open store");
        store.save_user(&demo_user()).expect("save user");
        store.save_token("opaque-token").expect("save token");
        assert_eq!(store.load_token().as_deref(), Some("opaque-token"));

        store.clear_all();
        assert!(matches!(store.load_user(), StoredUser::Absent));
        assert!(store.load_token().is_none());
    }
}
