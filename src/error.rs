#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token error: {0}")]
    Token(String),
    #[error("Session error: {0}")]
    Session(String),
    #[error("invalid chain address: {0}")]
    InvalidAddress(String),
    #[error("Signer unavailable. Please sign in.")]
    SignerUnavailable,
    #[error("{operation} failed: {detail}")]
    Endpoint {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
}
