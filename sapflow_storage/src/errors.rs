use thiserror::Error;

/// A central error enum for secret and warehouse storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no stored secret for profile '{0}'; run `sapflow secret set` first")]
    SecretNotFound(String),

    #[error("keyring access failed: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("warehouse failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
