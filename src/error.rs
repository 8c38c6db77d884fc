use crate::Hash;

/// error type for herodb operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("store not found: {0}")]
    StoreNotFound(String),

    #[error("store already exists: {0}")]
    StoreExists(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("invalid branch name: {0}")]
    InvalidBranch(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("object not found: {0}")]
    ObjectNotFound(Hash),

    #[error("corrupt object: hash mismatch for {0}")]
    CorruptObject(Hash),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("invalid regex pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("gc failure: {0}")]
    GcFailure(String),

    #[error("background task failed: {0}")]
    TaskJoin(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<std::path::PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<std::path::PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}

impl Error {
    /// HTTP status code for this error, per the server's error-handling design
    pub fn status_code(&self) -> u16 {
        match self {
            Error::StoreNotFound(_)
            | Error::BranchNotFound(_)
            | Error::KeyNotFound(_)
            | Error::ObjectNotFound(_) => 404,
            Error::InvalidBranch(_)
            | Error::InvalidKey(_)
            | Error::InvalidHashHex(_)
            | Error::InvalidPattern(_)
            | Error::InvalidArgument(_) => 400,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::StoreNotFound("x".into()).status_code(), 404);
        assert_eq!(Error::InvalidArgument("x".into()).status_code(), 400);
        assert_eq!(Error::GcFailure("x".into()).status_code(), 500);
    }
}
