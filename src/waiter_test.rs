#[cfg(test)]
mod tests {
    use crate::config::WaitPolicy;
    use crate::fake::InMemoryControlPlane;
    use crate::kind::RemoteKind;
    use crate::remote::{Record, RemoteError, RemoteStateAccessor};
    use crate::tags::TagSet;
    use crate::waiter::*;
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    const ID: &str = "AGENT12345";

    fn policy() -> WaitPolicy {
        WaitPolicy::new(Duration::from_secs(60), Duration::from_secs(15))
    }

    /// Paused time advances to timer deadlines, which round to whole milliseconds.
    fn assert_elapsed(started: Instant, secs: u64) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs + 1),
            "expected ~{}s, got {:?}",
            secs,
            elapsed
        );
    }

    fn waiter(control_plane: &Arc<InMemoryControlPlane>) -> ConvergenceWaiter {
        let accessor = RemoteStateAccessor::new(control_plane.clone(), RemoteKind::Agent);
        ConvergenceWaiter::new(accessor, policy(), policy())
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_condition_sleeps_before_first_probe() {
        let started = Instant::now();
        let probes = AtomicU32::new(0);
        let counter = &probes;

        await_condition("immediate", &policy(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(true)
        })
        .await
        .unwrap();

        assert_eq!(probes.load(Ordering::SeqCst), 1);
        assert_elapsed(started, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_condition_timeout_boundary() {
        let started = Instant::now();

        let err = await_condition("never", &policy(), || async { Ok::<_, Error>(false) })
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60), "failed early after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(75), "failed late after {:?}", elapsed);
        match err {
            Error::ConvergenceTimeout { what, timeout, attempts } => {
                assert_eq!(what, "never");
                assert_eq!(timeout, Duration::from_secs(60));
                assert_eq!(attempts, 4);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_condition_propagates_probe_error() {
        let started = Instant::now();

        let err = await_condition("failing", &policy(), || async {
            Err::<bool, _>(Error::Assertion("probe failed".to_string()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Assertion(_)));
        assert!(!err.is_timeout());
        assert_elapsed(started, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_condition_rejects_zero_interval() {
        let probes = AtomicU32::new(0);
        let counter = &probes;
        let policy = WaitPolicy::new(Duration::from_secs(60), Duration::ZERO);

        let err = await_condition("hot loop", &policy, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(false)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert_eq!(probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_exists() {
        let control_plane = Arc::new(InMemoryControlPlane::new());
        control_plane.put_record(RemoteKind::Agent, ID, Record::new(), Duration::from_secs(40));

        let started = Instant::now();
        waiter(&control_plane).wait_until_exists(ID).await.unwrap();

        // Probes at 15s and 30s miss, 45s sees the record
        assert_elapsed(started, 45);
        assert_eq!(control_plane.get_calls(), 3);

        let accessor = RemoteStateAccessor::new(control_plane.clone(), RemoteKind::Agent);
        assert!(accessor.get(ID).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_exists_times_out() {
        let control_plane = Arc::new(InMemoryControlPlane::new());

        let err = waiter(&control_plane).wait_until_exists(ID).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("Agent AGENT12345 to exist in GetAgent API"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_exists_propagates_remote_error() {
        let control_plane = Arc::new(InMemoryControlPlane::new());
        control_plane.put_record(RemoteKind::Agent, ID, Record::new(), Duration::ZERO);
        control_plane.inject_failure(RemoteError::Service {
            code: "InternalServerException".to_string(),
            message: "boom".to_string(),
        });

        let err = waiter(&control_plane).wait_until_exists(ID).await.unwrap_err();

        assert!(matches!(err, Error::Remote(RemoteError::Service { .. })));
        assert_eq!(control_plane.get_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_deleted() {
        let control_plane = Arc::new(InMemoryControlPlane::new());
        control_plane.put_record(RemoteKind::Agent, ID, Record::new(), Duration::ZERO);
        control_plane.remove_record(RemoteKind::Agent, ID, Duration::from_secs(20));

        let started = Instant::now();
        waiter(&control_plane).wait_until_deleted(ID).await.unwrap();

        assert_elapsed(started, 30);
        let accessor = RemoteStateAccessor::new(control_plane.clone(), RemoteKind::Agent);
        assert!(accessor.get(ID).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_deleted_times_out() {
        let control_plane = Arc::new(InMemoryControlPlane::new());
        control_plane.put_record(RemoteKind::Agent, ID, Record::new(), Duration::ZERO);

        let err = waiter(&control_plane).wait_until_deleted(ID).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("to be deleted in GetAgent API"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_tags_match() {
        let control_plane = Arc::new(InMemoryControlPlane::new());
        let arn = "arn:aws:bedrock:us-west-2:000000000000:agent/AGENT12345";

        let old: TagSet = [("test1".to_string(), "value1".to_string())].into_iter().collect();
        let new: TagSet = [
            ("test1".to_string(), "newValue1".to_string()),
            ("test2".to_string(), "value2".to_string()),
        ]
        .into_iter()
        .collect();
        control_plane.put_tags(arn, old, Duration::ZERO);
        control_plane.put_tags(arn, new.clone(), Duration::from_secs(25));

        let started = Instant::now();
        waiter(&control_plane).wait_until_tags_match(arn, &new).await.unwrap();
        assert_elapsed(started, 30);
    }
}
