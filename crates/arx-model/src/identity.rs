//! User directory capability.
//!
//! The model service never manages identities itself; it forwards to a
//! [`UserDirectory`] and narrows the outcome into [`ModelError`]. The
//! in-memory directory here is enough for tests and single-process embedding.
//!
//! [`ModelError`]: crate::error::ModelError

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::user::{Group, User};

/// Outcomes a user directory may report.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    #[error("email already in use: {0}")]
    EmailAlreadyExists(String),

    #[error("group already exists: {0}")]
    GroupAlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("illegal operation: {0}")]
    IllegalOperation(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The directory itself failed (connection, storage).
    #[error("directory backend failure: {0}")]
    Backend(String),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Identity store consumed by the model service.
pub trait UserDirectory: Send + Sync {
    /// Self-registration: the user starts inactive with a pending email
    /// confirmation token.
    fn register_user(&self, user: &User, password: &str) -> DirectoryResult<User>;

    /// Administrative creation.
    fn add_user(&self, user: &User) -> DirectoryResult<User>;

    fn set_user_password(&self, username: &str, password: &str) -> DirectoryResult<()>;

    fn modify_user(&self, user: &User) -> DirectoryResult<User>;

    fn remove_user(&self, username: &str) -> DirectoryResult<()>;

    fn add_group(&self, group: &Group) -> DirectoryResult<Group>;

    fn modify_group(&self, group: &Group) -> DirectoryResult<Group>;

    fn remove_group(&self, group_id: &str) -> DirectoryResult<()>;

    /// Activate the account matching `username` (and `email` if given) when
    /// `token` is its pending confirmation token.
    fn confirm_user_email(&self, username: &str, email: Option<&str>, token: &str) -> DirectoryResult<User>;

    /// Issue a password reset token for the user found by name or email.
    fn request_password_reset(&self, username: Option<&str>, email: Option<&str>) -> DirectoryResult<User>;

    fn reset_user_password(&self, username: &str, password: &str, token: &str) -> DirectoryResult<User>;
}

#[derive(Debug)]
struct Account {
    user: User,
    password_hash: Option<String>,
    email_token: Option<String>,
    reset_token: Option<String>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: BTreeMap<String, Account>,
    groups: BTreeMap<String, Group>,
}

/// In-process directory. Passwords are kept as BLAKE3 hashes.
///
/// Protected principals (by default `admin`) can be neither modified nor
/// removed; doing so is an illegal operation.
#[derive(Debug)]
pub struct InMemoryUserDirectory {
    state: RwLock<DirectoryState>,
    protected: Vec<String>,
}

impl Default for InMemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_password(password: &str) -> String {
    blake3::hash(password.as_bytes()).to_hex().to_string()
}

fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::with_protected(["admin"])
    }

    pub fn with_protected<S: Into<String>>(protected: impl IntoIterator<Item = S>) -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
            protected: protected.into_iter().map(Into::into).collect(),
        }
    }

    pub fn user(&self, username: &str) -> Option<User> {
        let state = self.state.read().expect("lock poisoned");
        state.users.get(username).map(|a| a.user.clone())
    }

    pub fn group(&self, group_id: &str) -> Option<Group> {
        let state = self.state.read().expect("lock poisoned");
        state.groups.get(group_id).cloned()
    }

    /// `true` if `password` matches the stored hash.
    pub fn check_password(&self, username: &str, password: &str) -> bool {
        let state = self.state.read().expect("lock poisoned");
        state
            .users
            .get(username)
            .and_then(|a| a.password_hash.as_deref())
            .is_some_and(|h| h == hash_password(password))
    }

    /// Pending email confirmation token, as it would be mailed out.
    pub fn email_token(&self, username: &str) -> Option<String> {
        let state = self.state.read().expect("lock poisoned");
        state.users.get(username).and_then(|a| a.email_token.clone())
    }

    /// Pending password reset token, as it would be mailed out.
    pub fn reset_token(&self, username: &str) -> Option<String> {
        let state = self.state.read().expect("lock poisoned");
        state.users.get(username).and_then(|a| a.reset_token.clone())
    }

    fn is_protected(&self, id: &str) -> bool {
        self.protected.iter().any(|p| p == id)
    }

    fn insert(&self, user: &User, password: Option<&str>, email_token: Option<String>) -> DirectoryResult<User> {
        let mut state = self.state.write().expect("lock poisoned");
        if state.users.contains_key(&user.id) {
            return Err(DirectoryError::UserAlreadyExists(user.id.clone()));
        }
        if state.users.values().any(|a| a.user.email == user.email) {
            return Err(DirectoryError::EmailAlreadyExists(user.email.clone()));
        }
        let mut stored = user.clone();
        if email_token.is_some() {
            stored.active = false;
        }
        state.users.insert(
            user.id.clone(),
            Account {
                user: stored.clone(),
                password_hash: password.map(hash_password),
                email_token,
                reset_token: None,
            },
        );
        Ok(stored)
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn register_user(&self, user: &User, password: &str) -> DirectoryResult<User> {
        self.insert(user, Some(password), Some(new_token()))
    }

    fn add_user(&self, user: &User) -> DirectoryResult<User> {
        self.insert(user, None, None)
    }

    fn set_user_password(&self, username: &str, password: &str) -> DirectoryResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let account = state
            .users
            .get_mut(username)
            .ok_or_else(|| DirectoryError::NotFound(username.into()))?;
        account.password_hash = Some(hash_password(password));
        Ok(())
    }

    fn modify_user(&self, user: &User) -> DirectoryResult<User> {
        if self.is_protected(&user.id) {
            return Err(DirectoryError::IllegalOperation(format!("user {} is protected", user.id)));
        }
        let mut state = self.state.write().expect("lock poisoned");
        if state
            .users
            .values()
            .any(|a| a.user.id != user.id && a.user.email == user.email)
        {
            return Err(DirectoryError::EmailAlreadyExists(user.email.clone()));
        }
        let account = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| DirectoryError::NotFound(user.id.clone()))?;
        account.user = user.clone();
        Ok(user.clone())
    }

    fn remove_user(&self, username: &str) -> DirectoryResult<()> {
        if self.is_protected(username) {
            return Err(DirectoryError::IllegalOperation(format!("user {username} is protected")));
        }
        let mut state = self.state.write().expect("lock poisoned");
        state.users.remove(username);
        for group in state.groups.values_mut() {
            group.users.remove(username);
        }
        Ok(())
    }

    fn add_group(&self, group: &Group) -> DirectoryResult<Group> {
        let mut state = self.state.write().expect("lock poisoned");
        if state.groups.contains_key(&group.id) {
            return Err(DirectoryError::GroupAlreadyExists(group.id.clone()));
        }
        state.groups.insert(group.id.clone(), group.clone());
        Ok(group.clone())
    }

    fn modify_group(&self, group: &Group) -> DirectoryResult<Group> {
        if self.is_protected(&group.id) {
            return Err(DirectoryError::IllegalOperation(format!("group {} is protected", group.id)));
        }
        let mut state = self.state.write().expect("lock poisoned");
        let stored = state
            .groups
            .get_mut(&group.id)
            .ok_or_else(|| DirectoryError::NotFound(group.id.clone()))?;
        *stored = group.clone();
        Ok(group.clone())
    }

    fn remove_group(&self, group_id: &str) -> DirectoryResult<()> {
        if self.is_protected(group_id) {
            return Err(DirectoryError::IllegalOperation(format!("group {group_id} is protected")));
        }
        let mut state = self.state.write().expect("lock poisoned");
        state.groups.remove(group_id);
        for account in state.users.values_mut() {
            account.user.groups.remove(group_id);
        }
        Ok(())
    }

    fn confirm_user_email(&self, username: &str, email: Option<&str>, token: &str) -> DirectoryResult<User> {
        let mut state = self.state.write().expect("lock poisoned");
        let account = state
            .users
            .get_mut(username)
            .filter(|a| email.map_or(true, |e| a.user.email == e))
            .ok_or_else(|| DirectoryError::NotFound(username.into()))?;
        if account.email_token.as_deref() != Some(token) {
            return Err(DirectoryError::InvalidToken(format!("email confirmation for {username}")));
        }
        account.email_token = None;
        account.user.active = true;
        Ok(account.user.clone())
    }

    fn request_password_reset(&self, username: Option<&str>, email: Option<&str>) -> DirectoryResult<User> {
        let mut state = self.state.write().expect("lock poisoned");
        let account = state
            .users
            .values_mut()
            .find(|a| match (username, email) {
                (Some(u), _) => a.user.id == u,
                (None, Some(e)) => a.user.email == e,
                (None, None) => false,
            })
            .ok_or_else(|| {
                DirectoryError::NotFound(username.or(email).unwrap_or("<no user given>").to_string())
            })?;
        if !account.user.active {
            return Err(DirectoryError::IllegalOperation(format!(
                "user {} is not active",
                account.user.id
            )));
        }
        account.reset_token = Some(new_token());
        Ok(account.user.clone())
    }

    fn reset_user_password(&self, username: &str, password: &str, token: &str) -> DirectoryResult<User> {
        let mut state = self.state.write().expect("lock poisoned");
        let account = state
            .users
            .get_mut(username)
            .ok_or_else(|| DirectoryError::NotFound(username.into()))?;
        if !account.user.active {
            return Err(DirectoryError::IllegalOperation(format!("user {username} is not active")));
        }
        if account.reset_token.as_deref() != Some(token) {
            return Err(DirectoryError::InvalidToken(format!("password reset for {username}")));
        }
        account.reset_token = None;
        account.password_hash = Some(hash_password(password));
        Ok(account.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::new("alice", "Alice", "alice@example.org")
    }

    #[test]
    fn duplicates_are_classified() {
        let dir = InMemoryUserDirectory::new();
        dir.add_user(&alice()).unwrap();
        assert!(matches!(dir.add_user(&alice()), Err(DirectoryError::UserAlreadyExists(_))));
        let twin = User::new("alice2", "Alice Two", "alice@example.org");
        assert!(matches!(dir.add_user(&twin), Err(DirectoryError::EmailAlreadyExists(_))));
    }

    #[test]
    fn registration_requires_email_confirmation() {
        let dir = InMemoryUserDirectory::new();
        let registered = dir.register_user(&alice(), "s3cret").unwrap();
        assert!(!registered.active);
        assert!(dir.check_password("alice", "s3cret"));

        assert!(matches!(
            dir.confirm_user_email("alice", None, "wrong"),
            Err(DirectoryError::InvalidToken(_))
        ));
        let token = dir.email_token("alice").unwrap();
        assert!(matches!(
            dir.confirm_user_email("alice", Some("other@example.org"), &token),
            Err(DirectoryError::NotFound(_))
        ));
        let confirmed = dir.confirm_user_email("alice", Some("alice@example.org"), &token).unwrap();
        assert!(confirmed.active);
        assert!(dir.email_token("alice").is_none());
    }

    #[test]
    fn password_reset_flow() {
        let dir = InMemoryUserDirectory::new();
        dir.add_user(&alice()).unwrap();
        dir.request_password_reset(None, Some("alice@example.org")).unwrap();
        let token = dir.reset_token("alice").unwrap();
        assert!(matches!(
            dir.reset_user_password("alice", "new", "bogus"),
            Err(DirectoryError::InvalidToken(_))
        ));
        dir.reset_user_password("alice", "new", &token).unwrap();
        assert!(dir.check_password("alice", "new"));
        assert!(dir.reset_token("alice").is_none());
    }

    #[test]
    fn inactive_users_cannot_reset() {
        let dir = InMemoryUserDirectory::new();
        let mut user = alice();
        user.active = false;
        dir.add_user(&user).unwrap();
        assert!(matches!(
            dir.request_password_reset(Some("alice"), None),
            Err(DirectoryError::IllegalOperation(_))
        ));
    }

    #[test]
    fn protected_principals_are_immutable() {
        let dir = InMemoryUserDirectory::new();
        dir.add_user(&User::new("admin", "Admin", "admin@example.org")).unwrap();
        assert!(matches!(dir.remove_user("admin"), Err(DirectoryError::IllegalOperation(_))));
        assert!(matches!(
            dir.modify_user(&User::new("admin", "Root", "admin@example.org")),
            Err(DirectoryError::IllegalOperation(_))
        ));
    }

    #[test]
    fn removing_a_group_drops_memberships() {
        let dir = InMemoryUserDirectory::new();
        dir.add_group(&Group::new("archivists", "Archivists")).unwrap();
        let mut user = alice();
        user.groups.insert("archivists".into());
        dir.add_user(&user).unwrap();
        assert!(matches!(
            dir.add_group(&Group::new("archivists", "Again")),
            Err(DirectoryError::GroupAlreadyExists(_))
        ));
        dir.remove_group("archivists").unwrap();
        assert!(dir.group("archivists").is_none());
        assert!(dir.user("alice").unwrap().groups.is_empty());
    }
}
