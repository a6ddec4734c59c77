//! Identity passthrough.
//!
//! Each operation forwards to the configured [`UserDirectory`] and narrows
//! its outcome to the few errors the caller is expected to handle; anything
//! else becomes `Generic`. Without a directory the call is skipped and only
//! the notification goes out.
//!
//! [`UserDirectory`]: crate::identity::UserDirectory

use tracing::info;

use super::ModelService;
use crate::error::{ModelError, ModelResult};
use crate::identity::{DirectoryError, UserDirectory};
use crate::notify::ModelEvent;
use crate::user::{Group, User};

fn unexpected(operation: &str, e: DirectoryError) -> ModelError {
    ModelError::wrap(format!("{operation} failed"), e)
}

impl ModelService {
    fn directory(&self) -> Option<&dyn UserDirectory> {
        self.users.as_deref()
    }

    /// Self-registration with a password.
    pub fn register_user(&self, user: &User, password: &str, notify: bool) -> ModelResult<User> {
        let stored = match self.directory() {
            Some(dir) => dir.register_user(user, password).map_err(|e| match e {
                DirectoryError::UserAlreadyExists(id) => ModelError::UserAlreadyExists(id),
                DirectoryError::EmailAlreadyExists(email) => ModelError::EmailAlreadyExists(email),
                other => unexpected("registering user", other),
            })?,
            None => user.clone(),
        };
        info!(user = %stored.id, "registered user");
        self.publish(notify, ModelEvent::UserCreated(stored.clone()));
        Ok(stored)
    }

    /// Administrative creation, setting `password` when given.
    pub fn add_user(&self, user: &User, password: Option<&str>, notify: bool) -> ModelResult<User> {
        let stored = match self.directory() {
            Some(dir) => {
                let stored = dir.add_user(user).map_err(|e| match e {
                    DirectoryError::UserAlreadyExists(id) => ModelError::UserAlreadyExists(id),
                    DirectoryError::EmailAlreadyExists(email) => ModelError::EmailAlreadyExists(email),
                    other => unexpected("adding user", other),
                })?;
                if let Some(password) = password {
                    dir.set_user_password(&user.id, password)
                        .map_err(|e| unexpected("setting password", e))?;
                }
                stored
            }
            None => user.clone(),
        };
        info!(user = %stored.id, "added user");
        self.publish(notify, ModelEvent::UserCreated(stored.clone()));
        Ok(stored)
    }

    /// Update a user, setting `password` first when given.
    pub fn modify_user(&self, user: &User, password: Option<&str>, notify: bool) -> ModelResult<User> {
        let narrow = |e: DirectoryError| match e {
            DirectoryError::EmailAlreadyExists(email) => ModelError::AlreadyExists(email),
            DirectoryError::NotFound(id) => ModelError::NotFound(id),
            DirectoryError::IllegalOperation(why) => ModelError::AuthorizationDenied(why),
            other => unexpected("modifying user", other),
        };
        let stored = match self.directory() {
            Some(dir) => {
                if let Some(password) = password {
                    dir.set_user_password(&user.id, password).map_err(narrow)?;
                }
                dir.modify_user(user).map_err(narrow)?
            }
            None => user.clone(),
        };
        info!(user = %stored.id, "modified user");
        self.publish(notify, ModelEvent::UserUpdated(stored.clone()));
        Ok(stored)
    }

    pub fn remove_user(&self, username: &str, notify: bool) -> ModelResult<()> {
        if let Some(dir) = self.directory() {
            dir.remove_user(username).map_err(|e| match e {
                DirectoryError::IllegalOperation(why) => ModelError::AuthorizationDenied(why),
                other => unexpected("removing user", other),
            })?;
        }
        info!(user = username, "removed user");
        self.publish(
            notify,
            ModelEvent::UserDeleted {
                user_id: username.to_string(),
            },
        );
        Ok(())
    }

    pub fn add_group(&self, group: &Group, notify: bool) -> ModelResult<Group> {
        let stored = match self.directory() {
            Some(dir) => dir.add_group(group).map_err(|e| match e {
                DirectoryError::GroupAlreadyExists(id) => ModelError::AlreadyExists(id),
                other => unexpected("adding group", other),
            })?,
            None => group.clone(),
        };
        info!(group = %stored.id, "added group");
        self.publish(notify, ModelEvent::GroupCreated(stored.clone()));
        Ok(stored)
    }

    pub fn modify_group(&self, group: &Group, notify: bool) -> ModelResult<Group> {
        let stored = match self.directory() {
            Some(dir) => dir.modify_group(group).map_err(|e| match e {
                DirectoryError::NotFound(id) => ModelError::NotFound(id),
                DirectoryError::IllegalOperation(why) => ModelError::AuthorizationDenied(why),
                other => unexpected("modifying group", other),
            })?,
            None => group.clone(),
        };
        info!(group = %stored.id, "modified group");
        self.publish(notify, ModelEvent::GroupUpdated(stored.clone()));
        Ok(stored)
    }

    pub fn remove_group(&self, group_id: &str, notify: bool) -> ModelResult<()> {
        if let Some(dir) = self.directory() {
            dir.remove_group(group_id).map_err(|e| match e {
                DirectoryError::IllegalOperation(why) => ModelError::AuthorizationDenied(why),
                other => unexpected("removing group", other),
            })?;
        }
        info!(group = group_id, "removed group");
        self.publish(
            notify,
            ModelEvent::GroupDeleted {
                group_id: group_id.to_string(),
            },
        );
        Ok(())
    }

    /// Confirm a registration email. `None` when no directory is configured.
    pub fn confirm_user_email(
        &self,
        username: &str,
        email: Option<&str>,
        token: &str,
        notify: bool,
    ) -> ModelResult<Option<User>> {
        let Some(dir) = self.directory() else {
            return Ok(None);
        };
        let user = dir.confirm_user_email(username, email, token).map_err(|e| match e {
            DirectoryError::NotFound(id) => ModelError::NotFound(id),
            DirectoryError::InvalidToken(why) => ModelError::InvalidToken(why),
            other => unexpected("confirming email", other),
        })?;
        self.publish(notify, ModelEvent::UserUpdated(user.clone()));
        Ok(Some(user))
    }

    pub fn request_password_reset(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        notify: bool,
    ) -> ModelResult<Option<User>> {
        let Some(dir) = self.directory() else {
            return Ok(None);
        };
        let user = dir.request_password_reset(username, email).map_err(|e| match e {
            DirectoryError::NotFound(id) => ModelError::NotFound(id),
            DirectoryError::IllegalOperation(why) => ModelError::IllegalOperation(why),
            other => unexpected("requesting password reset", other),
        })?;
        self.publish(notify, ModelEvent::UserUpdated(user.clone()));
        Ok(Some(user))
    }

    pub fn reset_user_password(
        &self,
        username: &str,
        password: &str,
        token: &str,
        notify: bool,
    ) -> ModelResult<Option<User>> {
        let Some(dir) = self.directory() else {
            return Ok(None);
        };
        let user = dir.reset_user_password(username, password, token).map_err(|e| match e {
            DirectoryError::NotFound(id) => ModelError::NotFound(id),
            DirectoryError::InvalidToken(why) => ModelError::InvalidToken(why),
            DirectoryError::IllegalOperation(why) => ModelError::IllegalOperation(why),
            other => unexpected("resetting password", other),
        })?;
        self.publish(notify, ModelEvent::UserUpdated(user.clone()));
        Ok(Some(user))
    }
}
