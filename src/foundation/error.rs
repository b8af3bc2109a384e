pub type VidgraphResult<T> = Result<T, VidgraphError>;

#[derive(thiserror::Error, Debug)]
pub enum VidgraphError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Cycles, dangling endpoints and unknown node kinds.
    #[error("graph error: {0}")]
    Graph(String),

    /// Texture allocation failures and decoder initialisation failures.
    #[error("resource error: {0}")]
    Resource(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error("output '{0}' is not attached to a context")]
    Detached(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VidgraphError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for VidgraphError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
