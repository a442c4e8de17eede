/// Key storage and key session errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The user has no saved key
    #[error("no saved API key for this account, add one in settings")]
    NotFound,

    /// A key was submitted empty
    #[error("API key must not be empty")]
    EmptyKey,

    /// HTTP request to the key store failed
    #[error("key store unreachable: {0}")]
    Request(#[from] reqwest::Error),

    /// Key store returned a non-success response
    #[error("key store error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the store
        message: String,
    },

    /// Key store answered with something that is not a key record
    #[error("invalid key store record: {0}")]
    InvalidRecord(String),
}
