use thiserror::Error;

use crate::types::{ProviderId, RouteId};

/// Errors from credential encryption/decryption
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Ciphertext is not valid base64 or is truncated
    #[error("malformed ciphertext")]
    Malformed,
    /// Authenticated decryption failed (wrong key or corrupted data)
    #[error("unable to decrypt credential")]
    Decrypt,
    /// Encryption failed
    #[error("unable to encrypt credential")]
    Encrypt,
}

/// Errors from catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No provider with the given id
    #[error("provider not found: {0}")]
    ProviderNotFound(ProviderId),

    /// No route with the given id
    #[error("route not found: {0}")]
    RouteNotFound(RouteId),

    /// A provider or route with this name already exists
    #[error("name already in use: {0}")]
    NameConflict(String),

    /// The record failed catalog validation
    #[error("{0}")]
    Validation(String),

    /// Credential crypto failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Reading or writing the catalog document failed
    #[error("catalog persistence failed: {0}")]
    Io(#[from] std::io::Error),
}
