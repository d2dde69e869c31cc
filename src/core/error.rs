use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid resource key: {0}")]
    InvalidKey(String),
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),
    #[error("Object not found: {0}")]
    NotFound(#[source] kube::Error),
    #[error("Stale write rejected: {0}")]
    Conflict(#[source] kube::Error),
    #[error("Kubernetes api error: {0}")]
    Transient(#[source] kube::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(response) if response.code == 404 => Self::NotFound(err),
            kube::Error::Api(response) if response.code == 409 => Self::Conflict(err),
            _ => Self::Transient(err),
        }
    }
}

impl Error {
    /// Whether the key that produced this error should be re-queued with backoff.
    ///
    /// Invalid keys and objects lacking mandatory metadata will fail in the same way on
    /// every attempt, so they are dropped instead.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidKey(_) | Self::MissingObjectKey(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "invalid-key",
            Self::MissingObjectKey(_) => "missing-object-key",
            Self::NotFound(_) => "not-found",
            Self::Conflict(_) => "conflict",
            Self::Transient(_) => "transient",
            Self::Serialization(_) => "serialization",
        }
    }
}
