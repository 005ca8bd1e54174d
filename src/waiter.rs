//! Bounded polling until the remote control plane converges

use crate::config::WaitPolicy;
use crate::remote::RemoteStateAccessor;
use crate::tags::{equal_tags, TagSet};
use crate::{Error, Result};
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Poll `probe` every `policy.interval` until it reports `true` or
/// `policy.timeout` has elapsed.
///
/// Each attempt sleeps first and then probes, so the first probe happens one
/// interval after the call. The deadline is checked before every sleep: the
/// wait never fails before `timeout` has passed. Errors from `probe` end the
/// wait immediately. A zero interval is rejected up front.
pub async fn await_condition<F, Fut>(what: &str, policy: &WaitPolicy, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    if policy.interval.is_zero() {
        return Err(Error::InvalidConfig {
            key: "interval".to_string(),
            value: format!("{:?}", policy.interval),
        });
    }

    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempts = 0u32;

    loop {
        if Instant::now() >= deadline {
            warn!(what, attempts, timeout = ?policy.timeout, "timed out waiting");
            return Err(Error::ConvergenceTimeout {
                what: what.to_string(),
                timeout: policy.timeout,
                attempts,
            });
        }

        tokio::time::sleep(policy.interval).await;
        attempts += 1;

        if probe().await? {
            debug!(what, attempts, elapsed = ?started.elapsed(), "condition met");
            return Ok(());
        }
        debug!(what, attempts, "condition not met yet");
    }
}

/// Waits for a remote resource to appear or disappear.
#[derive(Clone)]
pub struct ConvergenceWaiter {
    accessor: RemoteStateAccessor,
    exists_policy: WaitPolicy,
    deleted_policy: WaitPolicy,
}

impl ConvergenceWaiter {
    pub fn new(accessor: RemoteStateAccessor, exists_policy: WaitPolicy, deleted_policy: WaitPolicy) -> Self {
        Self {
            accessor,
            exists_policy,
            deleted_policy,
        }
    }

    pub async fn wait_until_exists(&self, id: &str) -> Result<()> {
        let kind = self.accessor.kind();
        let what = format!(
            "{} {} to exist in {} API",
            kind,
            id,
            kind.get_operation()
        );

        let accessor = &self.accessor;
        await_condition(&what, &self.exists_policy, move || async move {
            Ok::<_, Error>(accessor.get(id).await?.is_some())
        })
        .await?;

        info!(%kind, id, "remote resource exists");
        Ok(())
    }

    pub async fn wait_until_deleted(&self, id: &str) -> Result<()> {
        let kind = self.accessor.kind();
        let what = format!(
            "{} {} to be deleted in {} API",
            kind,
            id,
            kind.get_operation()
        );

        let accessor = &self.accessor;
        await_condition(&what, &self.deleted_policy, move || async move {
            Ok::<_, Error>(accessor.get(id).await?.is_none())
        })
        .await?;

        info!(%kind, id, "remote resource deleted");
        Ok(())
    }

    /// Wait until the tags on `arn` are exactly `expected`.
    pub async fn wait_until_tags_match(&self, arn: &str, expected: &TagSet) -> Result<()> {
        let what = format!("tags on {} to equal {:?}", arn, expected);

        let accessor = &self.accessor;
        await_condition(&what, &self.exists_policy, move || async move {
            Ok::<_, Error>(accessor
                .get_tags(arn)
                .await?
                .is_some_and(|tags| equal_tags(&tags, expected)))
        })
        .await
    }
}
