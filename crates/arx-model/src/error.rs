use arx_store::error::BoxError;
use arx_store::StorageError;
use arx_types::PathError;

use crate::validation::ValidationReport;

/// Errors from model operations.
///
/// The storage taxonomy is carried through variant for variant, so a caller
/// can tell "AIP does not exist" from "AIP exists but the request was
/// malformed" without looking at messages.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request not valid: {0}")]
    RequestNotValid(String),

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("{message}")]
    Generic {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Business-rule validation failed; carries every issue found.
    #[error("validation failed with {} issue(s)", .0.issues.len())]
    Validation(ValidationReport),

    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    #[error("email already exists: {0}")]
    EmailAlreadyExists(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("illegal operation: {0}")]
    IllegalOperation(String),
}

impl ModelError {
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error as [`ModelError::Generic`].
    pub fn wrap<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Generic {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<StorageError> for ModelError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(path) => Self::AlreadyExists(path.to_string()),
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::RequestNotValid(why) => Self::RequestNotValid(why),
            StorageError::AuthorizationDenied(why) => Self::AuthorizationDenied(why),
            StorageError::Generic { message, source } => Self::Generic { message, source },
        }
    }
}

impl From<PathError> for ModelError {
    fn from(err: PathError) -> Self {
        Self::RequestNotValid(err.to_string())
    }
}

impl From<ValidationReport> for ModelError {
    fn from(report: ValidationReport) -> Self {
        Self::Validation(report)
    }
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use arx_types::StoragePath;

    #[test]
    fn storage_taxonomy_is_preserved() {
        let path = StoragePath::parse("aip/x").unwrap();
        assert!(matches!(
            ModelError::from(StorageError::AlreadyExists(path.clone())),
            ModelError::AlreadyExists(p) if p == "aip/x"
        ));
        assert!(ModelError::from(StorageError::not_found(&path)).is_not_found());
        assert!(matches!(
            ModelError::from(StorageError::RequestNotValid("bad".into())),
            ModelError::RequestNotValid(_)
        ));
        assert!(matches!(
            ModelError::from(StorageError::AuthorizationDenied("no".into())),
            ModelError::AuthorizationDenied(_)
        ));
    }

    #[test]
    fn generic_keeps_its_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err = ModelError::from(StorageError::backend("writing", io));
        assert_eq!(err.to_string(), "writing");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn validation_message_counts_issues() {
        let mut report = ValidationReport::default();
        report.push("a", None);
        report.push("b", None);
        assert_eq!(
            ModelError::from(report).to_string(),
            "validation failed with 2 issue(s)"
        );
    }
}
