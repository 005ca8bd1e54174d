use crate::remote::RemoteError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Remote API error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Timed out after {timeout:?} ({attempts} polls) waiting for {what}")]
    ConvergenceTimeout {
        what: String,
        timeout: Duration,
        attempts: u32,
    },

    #[error("Fixture setup failed: {0}")]
    SetupAssertion(String),

    #[error("Fixture teardown failed: {0}")]
    TeardownAssertion(String),

    /// The test body failed and the teardown that followed failed as well.
    #[error("{body}; teardown also failed: {teardown}")]
    BodyAndTeardown { body: Box<Error>, teardown: Box<Error> },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration value {value:?} for {key}")]
    InvalidConfig { key: String, value: String },

    #[error("Invalid resource reference: {0}")]
    InvalidReference(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures raised by a poll loop running out of time, as opposed
    /// to assertion or API failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ConvergenceTimeout { .. })
    }
}
