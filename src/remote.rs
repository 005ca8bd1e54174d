//! Read-only access to the remote control plane
//!
//! The accessor is the one place where the remote "not found" error is given
//! meaning: it becomes `None`, which is what the convergence waits poll for.
//! Every other failure is returned untouched.

use crate::kind::RemoteKind;
use crate::tags::TagSet;
use crate::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// A record as returned by the remote control plane
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("ResourceNotFoundException: {resource} {id} not found")]
    NotFound { resource: String, id: String },

    #[error("ThrottlingException: {0}")]
    Throttled(String),

    #[error("AccessDeniedException: {0}")]
    AccessDenied(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },
}

impl RemoteError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        RemoteError::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// Read operations the harness needs from the remote control plane.
///
/// Implementations must report a missing resource as [`RemoteError::NotFound`].
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn get_resource(&self, kind: RemoteKind, id: &str) -> std::result::Result<Record, RemoteError>;

    async fn list_tags_for_resource(&self, arn: &str) -> std::result::Result<TagSet, RemoteError>;
}

/// Per-kind view over a [`ControlPlane`] translating not-found into absence.
#[derive(Clone)]
pub struct RemoteStateAccessor {
    control_plane: Arc<dyn ControlPlane>,
    kind: RemoteKind,
}

impl RemoteStateAccessor {
    pub fn new(control_plane: Arc<dyn ControlPlane>, kind: RemoteKind) -> Self {
        Self {
            control_plane,
            kind,
        }
    }

    pub fn kind(&self) -> RemoteKind {
        self.kind
    }

    /// Returns the remote record, or `None` if no such resource exists.
    pub async fn get(&self, id: &str) -> Result<Option<Record>> {
        trace!(kind = %self.kind, id, "{}", self.kind.get_operation());
        match self.control_plane.get_resource(self.kind, id).await {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => {
                debug!(kind = %self.kind, id, "remote resource not found");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the tags attached to `arn`, or `None` if the resource does not exist.
    pub async fn get_tags(&self, arn: &str) -> Result<Option<TagSet>> {
        trace!(kind = %self.kind, arn, "ListTagsForResource");
        match self.control_plane.list_tags_for_resource(arn).await {
            Ok(tags) => Ok(Some(tags)),
            Err(err) if err.is_not_found() => {
                debug!(kind = %self.kind, arn, "remote resource not found when listing tags");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}
