use std::fmt;

use arx_types::{PathError, StoragePath};

/// Boxed source error kept behind [`StorageError::Generic`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from storage operations.
///
/// Every backend classifies its failures into exactly these variants;
/// backend-specific errors only ever appear as the `source` of
/// [`StorageError::Generic`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A resource already exists where one was about to be created.
    #[error("resource already exists: {0}")]
    AlreadyExists(StoragePath),

    /// The referenced resource (or version) does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The request is structurally wrong: wrong resource kind at a path,
    /// malformed identifier, unsupported combination of arguments.
    #[error("request not valid: {0}")]
    RequestNotValid(String),

    /// The caller is not allowed to perform the operation.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Backend, I/O or parse failure.
    #[error("{message}")]
    Generic {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

/// Discriminant of [`StorageError`], for callers that branch on the taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    AlreadyExists,
    NotFound,
    RequestNotValid,
    AuthorizationDenied,
    Generic,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "already-exists"),
            Self::NotFound => write!(f, "not-found"),
            Self::RequestNotValid => write!(f, "request-not-valid"),
            Self::AuthorizationDenied => write!(f, "authorization-denied"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

impl StorageError {
    /// The taxonomy member of this error.
    pub fn kind(&self) -> StorageErrorKind {
        match self {
            Self::AlreadyExists(_) => StorageErrorKind::AlreadyExists,
            Self::NotFound(_) => StorageErrorKind::NotFound,
            Self::RequestNotValid(_) => StorageErrorKind::RequestNotValid,
            Self::AuthorizationDenied(_) => StorageErrorKind::AuthorizationDenied,
            Self::Generic { .. } => StorageErrorKind::Generic,
        }
    }

    /// `true` for [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// `true` for [`StorageError::AlreadyExists`].
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn not_found(path: &StoragePath) -> Self {
        Self::NotFound(path.to_string())
    }

    /// A resource exists at `path` but is not of the `expected` kind.
    pub fn wrong_kind(path: &StoragePath, expected: &str, actual: &str) -> Self {
        Self::RequestNotValid(format!("{path} is a {actual}, not a {expected}"))
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a backend error as [`StorageError::Generic`].
    pub fn backend<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Generic {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Classify an I/O error raised while operating on `path`.
    ///
    /// `ErrorKind::NotFound` becomes [`StorageError::NotFound`],
    /// `AlreadyExists` and `PermissionDenied` map to their taxonomy members,
    /// anything else is [`StorageError::Generic`].
    pub fn io(path: &StoragePath, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(path),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.clone()),
            std::io::ErrorKind::PermissionDenied => {
                Self::AuthorizationDenied(format!("{path}: {err}"))
            }
            _ => Self::backend(format!("I/O error on {path}"), err),
        }
    }
}

impl From<PathError> for StorageError {
    fn from(err: PathError) -> Self {
        Self::RequestNotValid(err.to_string())
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
