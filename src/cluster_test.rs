#[cfg(test)]
mod tests {
    use crate::cluster::*;
    use crate::config::PeriodicWait;
    use crate::fake::FakeEnvironmentBuilder;
    use crate::kind::{AGENT, RESOURCE_SYNCED};
    use crate::reference::CustomResourceReference;
    use crate::Error;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::time::Instant;

    fn agent_manifest(name: &str) -> Value {
        json!({
            "apiVersion": "bedrockagent.services.k8s.aws/v1alpha1",
            "kind": "Agent",
            "metadata": { "name": name },
            "spec": {
                "agentName": name,
                "description": "Test agent for e2e testing",
                "tags": { "test1": "value1" },
            }
        })
    }

    fn assert_elapsed(started: Instant, secs: u64) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs + 1),
            "expected ~{}s, got {:?}",
            secs,
            elapsed
        );
    }

    fn wait(periods: u32, secs: u64) -> PeriodicWait {
        PeriodicWait::new(periods, Duration::from_secs(secs))
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_and_get() {
        let env = FakeEnvironmentBuilder::new().without_controller().build().await.unwrap();
        let cluster = env.cluster();
        let reference = CustomResourceReference::for_kind(&AGENT, "agent-1", "default");

        let created = cluster.create(&reference, &agent_manifest("agent-1")).await.unwrap();
        assert_eq!(created["metadata"]["name"], json!("agent-1"));
        assert_eq!(created["metadata"]["resourceVersion"], json!("1"));

        let fetched = cluster.get(&reference).await.unwrap().unwrap();
        assert_eq!(fetched["spec"]["description"], json!("Test agent for e2e testing"));
        assert!(cluster.exists(&reference).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_missing_is_none() {
        let env = FakeEnvironmentBuilder::new().build().await.unwrap();
        let reference = CustomResourceReference::for_kind(&AGENT, "absent", "default");

        assert!(env.cluster().get(&reference).await.unwrap().is_none());
        assert!(!env.cluster().exists(&reference).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_duplicate_is_conflict() {
        let env = FakeEnvironmentBuilder::new().without_controller().build().await.unwrap();
        let cluster = env.cluster();
        let reference = CustomResourceReference::for_kind(&AGENT, "agent-1", "default");

        cluster.create(&reference, &agent_manifest("agent-1")).await.unwrap();
        let err = cluster
            .create(&reference, &agent_manifest("agent-1"))
            .await
            .unwrap_err();

        match err {
            Error::Kube(kube::Error::Api(response)) => {
                assert_eq!(response.code, 409);
                assert_eq!(response.reason, "AlreadyExists");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_patch_merges_spec() {
        let env = FakeEnvironmentBuilder::new().without_controller().build().await.unwrap();
        let cluster = env.cluster();
        let reference = CustomResourceReference::for_kind(&AGENT, "agent-1", "default");
        cluster.create(&reference, &agent_manifest("agent-1")).await.unwrap();

        let patched = cluster
            .patch(
                &reference,
                &json!({ "spec": { "description": "Updated test agent description" } }),
            )
            .await
            .unwrap();

        assert_eq!(patched["spec"]["description"], json!("Updated test agent description"));
        assert_eq!(patched["spec"]["agentName"], json!("agent-1"));
        assert_eq!(patched["metadata"]["generation"], json!(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete() {
        let env = FakeEnvironmentBuilder::new().without_controller().build().await.unwrap();
        let cluster = env.cluster();
        let reference = CustomResourceReference::for_kind(&AGENT, "agent-1", "default");
        cluster.create(&reference, &agent_manifest("agent-1")).await.unwrap();

        let (response, deleted) = cluster.delete(&reference, wait(3, 10)).await.unwrap();

        assert!(deleted);
        assert_eq!(response.unwrap()["metadata"]["name"], json!("agent-1"));
        assert!(!cluster.exists(&reference).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_missing_reports_deleted() {
        let env = FakeEnvironmentBuilder::new().build().await.unwrap();
        let reference = CustomResourceReference::for_kind(&AGENT, "absent", "default");

        let (response, deleted) = env.cluster().delete(&reference, wait(3, 10)).await.unwrap();

        assert!(response.is_none());
        assert!(deleted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_resource_consumed_by_controller() {
        let env = FakeEnvironmentBuilder::new()
            .with_reconcile_delay(Duration::from_secs(7))
            .build()
            .await
            .unwrap();
        let cluster = env.cluster();
        let reference = CustomResourceReference::for_kind(&AGENT, "agent-1", "default");
        cluster.create(&reference, &agent_manifest("agent-1")).await.unwrap();

        let record = cluster
            .wait_resource_consumed_by_controller(&reference, wait(10, 5))
            .await
            .unwrap()
            .expect("controller should populate status");

        let status = &record["status"];
        assert!(status["agentID"].as_str().is_some_and(|id| id.len() == 10));
        assert!(status["ackResourceMetadata"]["arn"]
            .as_str()
            .is_some_and(|arn| arn.starts_with("arn:aws:bedrock:us-west-2:000000000000:agent/")));
        assert_eq!(condition_status(&record, RESOURCE_SYNCED), Some("True"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_resource_consumed_without_controller() {
        let env = FakeEnvironmentBuilder::new().without_controller().build().await.unwrap();
        let cluster = env.cluster();
        let reference = CustomResourceReference::for_kind(&AGENT, "agent-1", "default");
        cluster.create(&reference, &agent_manifest("agent-1")).await.unwrap();

        let started = Instant::now();
        let record = cluster
            .wait_resource_consumed_by_controller(&reference, wait(3, 5))
            .await
            .unwrap();
        assert!(record.is_none());
        // Three checks, two sleeps in between
        assert_elapsed(started, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_on_condition() {
        let env = FakeEnvironmentBuilder::new().build().await.unwrap();
        let cluster = env.cluster();
        let reference = CustomResourceReference::for_kind(&AGENT, "agent-1", "default");
        cluster.create(&reference, &agent_manifest("agent-1")).await.unwrap();

        assert!(cluster
            .wait_on_condition(&reference, RESOURCE_SYNCED, "True", wait(5, 30))
            .await
            .unwrap());

        // A spec change flips the condition until the next reconcile
        cluster
            .patch(&reference, &json!({ "spec": { "description": "changed" } }))
            .await
            .unwrap();
        let current = cluster.get(&reference).await.unwrap().unwrap();
        assert_eq!(condition_status(&current, RESOURCE_SYNCED), Some("False"));

        let started = Instant::now();
        assert!(!cluster
            .wait_on_condition(&reference, "ACK.Terminal", "True", wait(2, 1))
            .await
            .unwrap());
        assert_elapsed(started, 1);
    }

    #[test]
    fn test_condition_status() {
        let record = json!({
            "status": {
                "conditions": [
                    { "type": "ACK.ResourceSynced", "status": "False" },
                    { "type": "Ready", "status": "True" },
                ]
            }
        });

        assert_eq!(condition_status(&record, "ACK.ResourceSynced"), Some("False"));
        assert_eq!(condition_status(&record, "Ready"), Some("True"));
        assert_eq!(condition_status(&record, "Missing"), None);
        assert_eq!(condition_status(&json!({ "spec": {} }), "Ready"), None);
    }
}
