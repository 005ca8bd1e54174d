//! Timeouts and poll intervals for the harness
//!
//! Every wait in the harness takes its policy from a [`HarnessConfig`] handed to
//! the fixture and scenario constructors. Defaults follow the latencies the
//! Bedrock control plane is known to need; `from_env` lets a run stretch them.

use crate::{Error, Result};
use std::time::Duration;

/// Bounded polling against the remote control plane: give up after `timeout`,
/// probing once per `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60 * 10),
            interval: Duration::from_secs(15),
        }
    }
}

/// A fixed number of checks against the cluster, `period_length` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicWait {
    pub periods: u32,
    pub period_length: Duration,
}

impl PeriodicWait {
    pub fn new(periods: u32, period_length: Duration) -> Self {
        Self {
            periods,
            period_length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Namespace custom resources are created in
    pub namespace: String,
    /// Wait for the remote resource to appear after create
    pub exists_wait: WaitPolicy,
    /// Wait for the remote resource to disappear after delete
    pub deleted_wait: WaitPolicy,
    /// Wait for the controller to populate `status` after create
    pub consumed_wait: PeriodicWait,
    /// Wait for the cluster to drop the object after delete
    pub delete_wait: PeriodicWait,
    /// Wait for the resource-synced condition
    pub sync_wait: PeriodicWait,
    /// Fixed sleep after patching a spec before reading remote state
    pub modify_settle: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            exists_wait: WaitPolicy::default(),
            deleted_wait: WaitPolicy::default(),
            consumed_wait: PeriodicWait::new(10, Duration::from_secs(5)),
            delete_wait: PeriodicWait::new(3, Duration::from_secs(10)),
            sync_wait: PeriodicWait::new(5, Duration::from_secs(30)),
            modify_settle: Duration::from_secs(30),
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `E2E_*` environment variables.
    ///
    /// Durations are given in whole seconds.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `E2E_*` keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(namespace) = lookup("E2E_NAMESPACE") {
            config.namespace = namespace;
        }

        override_secs(&lookup, "E2E_WAIT_UNTIL_EXISTS_TIMEOUT_SECONDS", &mut config.exists_wait.timeout)?;
        override_secs(&lookup, "E2E_WAIT_UNTIL_EXISTS_INTERVAL_SECONDS", &mut config.exists_wait.interval)?;
        override_secs(&lookup, "E2E_WAIT_UNTIL_DELETED_TIMEOUT_SECONDS", &mut config.deleted_wait.timeout)?;
        override_secs(&lookup, "E2E_WAIT_UNTIL_DELETED_INTERVAL_SECONDS", &mut config.deleted_wait.interval)?;
        override_periods(&lookup, "E2E_CONSUMED_WAIT_PERIODS", &mut config.consumed_wait.periods)?;
        override_secs(&lookup, "E2E_CONSUMED_WAIT_SECONDS", &mut config.consumed_wait.period_length)?;
        override_periods(&lookup, "E2E_DELETE_WAIT_PERIODS", &mut config.delete_wait.periods)?;
        override_secs(&lookup, "E2E_DELETE_WAIT_AFTER_SECONDS", &mut config.delete_wait.period_length)?;
        override_periods(&lookup, "E2E_CHECK_STATUS_WAIT_PERIODS", &mut config.sync_wait.periods)?;
        override_secs(&lookup, "E2E_CHECK_STATUS_WAIT_SECONDS", &mut config.sync_wait.period_length)?;
        override_secs(&lookup, "E2E_MODIFY_WAIT_AFTER_SECONDS", &mut config.modify_settle)?;

        check_policy(
            &config.exists_wait,
            "E2E_WAIT_UNTIL_EXISTS_TIMEOUT_SECONDS",
            "E2E_WAIT_UNTIL_EXISTS_INTERVAL_SECONDS",
        )?;
        check_policy(
            &config.deleted_wait,
            "E2E_WAIT_UNTIL_DELETED_TIMEOUT_SECONDS",
            "E2E_WAIT_UNTIL_DELETED_INTERVAL_SECONDS",
        )?;

        Ok(config)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_exists_wait(mut self, policy: WaitPolicy) -> Self {
        self.exists_wait = policy;
        self
    }

    pub fn with_deleted_wait(mut self, policy: WaitPolicy) -> Self {
        self.deleted_wait = policy;
        self
    }

    pub fn with_consumed_wait(mut self, wait: PeriodicWait) -> Self {
        self.consumed_wait = wait;
        self
    }

    pub fn with_delete_wait(mut self, wait: PeriodicWait) -> Self {
        self.delete_wait = wait;
        self
    }

    pub fn with_sync_wait(mut self, wait: PeriodicWait) -> Self {
        self.sync_wait = wait;
        self
    }

    pub fn with_modify_settle(mut self, settle: Duration) -> Self {
        self.modify_settle = settle;
        self
    }
}

fn parse_value<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => {
            let parsed = raw.trim().parse::<T>();
            parsed.map(Some).map_err(|_| Error::InvalidConfig {
                key: key.to_string(),
                value: raw,
            })
        }
    }
}

fn override_secs<F>(lookup: &F, key: &str, target: &mut Duration) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secs) = parse_value::<F, u64>(lookup, key)? {
        *target = Duration::from_secs(secs);
    }
    Ok(())
}

/// A policy needs a non-zero interval and room for at least one probe.
fn check_policy(policy: &WaitPolicy, timeout_key: &str, interval_key: &str) -> Result<()> {
    if policy.interval.is_zero() {
        return Err(Error::InvalidConfig {
            key: interval_key.to_string(),
            value: policy.interval.as_secs().to_string(),
        });
    }
    if policy.timeout < policy.interval {
        return Err(Error::InvalidConfig {
            key: timeout_key.to_string(),
            value: policy.timeout.as_secs().to_string(),
        });
    }
    Ok(())
}

fn override_periods<F>(lookup: &F, key: &str, target: &mut u32) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(periods) = parse_value::<F, u32>(lookup, key)? {
        *target = periods;
    }
    Ok(())
}
