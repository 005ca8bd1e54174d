//! Entry point wiring the cluster, the remote control plane, the manifest
//! loader and the configuration together.

use crate::cluster::Cluster;
use crate::config::HarnessConfig;
use crate::fixture::LifecycleFixture;
use crate::kind::ResourceKind;
use crate::loader::{Replacements, ResourceLoader};
use crate::remote::{ControlPlane, RemoteStateAccessor};
use crate::waiter::ConvergenceWaiter;
use crate::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct Harness {
    cluster: Cluster,
    control_plane: Arc<dyn ControlPlane>,
    loader: ResourceLoader,
    config: HarnessConfig,
}

impl Harness {
    pub fn new(
        cluster: Cluster,
        control_plane: Arc<dyn ControlPlane>,
        loader: ResourceLoader,
        config: HarnessConfig,
    ) -> Self {
        Self {
            cluster,
            control_plane,
            loader,
            config,
        }
    }

    /// Harness against the ambient cluster, with manifests, replacements and
    /// timings taken from the environment.
    pub async fn from_env(control_plane: Arc<dyn ControlPlane>) -> Result<Self> {
        Ok(Self::new(
            Cluster::try_default().await?,
            control_plane,
            ResourceLoader::from_env(),
            HarnessConfig::from_env()?,
        ))
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn accessor(&self, kind: &ResourceKind) -> RemoteStateAccessor {
        RemoteStateAccessor::new(self.control_plane.clone(), kind.remote)
    }

    pub fn waiter(&self, kind: &ResourceKind) -> ConvergenceWaiter {
        ConvergenceWaiter::new(
            self.accessor(kind),
            self.config.exists_wait,
            self.config.deleted_wait,
        )
    }

    /// Fixture creating `kind` from its template rendered with `replacements`.
    pub fn fixture(&self, kind: ResourceKind, replacements: Replacements) -> LifecycleFixture {
        LifecycleFixture::new(
            self.cluster.clone(),
            self.accessor(&kind),
            kind,
            self.loader.clone(),
            replacements,
            self.config.clone(),
        )
    }
}
