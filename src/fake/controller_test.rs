#[cfg(test)]
mod tests {
    use crate::fake::FakeEnvironmentBuilder;
    use crate::kind::{RemoteKind, AGENT, KNOWLEDGE_BASE, RESOURCE_SYNCED};
    use crate::reference::CustomResourceReference;
    use crate::remote::ControlPlane;
    use crate::tags::TagSet;
    use crate::condition_status;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn knowledge_base_manifest(name: &str) -> Value {
        json!({
            "apiVersion": "bedrockagent.services.k8s.aws/v1alpha1",
            "kind": "KnowledgeBase",
            "metadata": { "name": name },
            "spec": {
                "name": name,
                "description": "Test knowledge base for e2e testing",
                "tags": { "test1": "value1" },
            }
        })
    }

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_publishes_status_and_remote_state() {
        let env = FakeEnvironmentBuilder::new()
            .with_reconcile_delay(Duration::from_secs(1))
            .with_propagation_delay(Duration::from_secs(10))
            .with_region("eu-central-1")
            .with_account_id("123456789012")
            .build()
            .await
            .unwrap();
        let cluster = env.cluster();
        let reference = CustomResourceReference::for_kind(&KNOWLEDGE_BASE, "kb-1", "default");
        cluster.create(&reference, &knowledge_base_manifest("kb-1")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        let record = cluster.get(&reference).await.unwrap().unwrap();
        let id = record["status"]["knowledgeBaseID"].as_str().unwrap().to_string();
        let arn = record["status"]["ackResourceMetadata"]["arn"].as_str().unwrap().to_string();
        assert_eq!(arn, format!("arn:aws:bedrock:eu-central-1:123456789012:knowledge-base/{}", id));
        assert_eq!(record["status"]["ackResourceMetadata"]["region"], json!("eu-central-1"));
        assert_eq!(condition_status(&record, RESOURCE_SYNCED), Some("True"));

        // Not visible remotely until the propagation delay has passed
        let control_plane = env.control_plane();
        assert!(control_plane
            .get_resource(RemoteKind::KnowledgeBase, &id)
            .await
            .unwrap_err()
            .is_not_found());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let remote = control_plane
            .get_resource(RemoteKind::KnowledgeBase, &id)
            .await
            .unwrap();
        assert_eq!(remote["description"], json!("Test knowledge base for e2e testing"));
        assert_eq!(remote["knowledgeBaseArn"], json!(arn));
        assert_eq!(remote["status"], json!("ACTIVE"));
        assert!(remote.get("tags").is_none());

        let remote_tags = control_plane.list_tags_for_resource(&arn).await.unwrap();
        assert_eq!(remote_tags, tags(&[("test1", "value1")]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spec_change_syncs_remote_tags() {
        let env = FakeEnvironmentBuilder::new()
            .with_reconcile_delay(Duration::from_secs(1))
            .with_propagation_delay(Duration::from_secs(5))
            .build()
            .await
            .unwrap();
        let cluster = env.cluster();
        let reference = CustomResourceReference::for_kind(&KNOWLEDGE_BASE, "kb-1", "default");
        cluster.create(&reference, &knowledge_base_manifest("kb-1")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let record = cluster.get(&reference).await.unwrap().unwrap();
        let arn = record["status"]["ackResourceMetadata"]["arn"].as_str().unwrap().to_string();

        // Merge patch with a null removes the key
        cluster
            .patch(
                &reference,
                &json!({ "spec": { "tags": { "test1": null, "test2": "value2" } } }),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let remote_tags = env.control_plane().list_tags_for_resource(&arn).await.unwrap();
        assert_eq!(remote_tags, tags(&[("test2", "value2")]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_removes_remote_record() {
        let env = FakeEnvironmentBuilder::new()
            .with_reconcile_delay(Duration::from_secs(1))
            .with_propagation_delay(Duration::from_secs(5))
            .build()
            .await
            .unwrap();
        let cluster = env.cluster();
        let reference = CustomResourceReference::for_kind(&AGENT, "agent-1", "default");
        cluster
            .create(
                &reference,
                &json!({
                    "apiVersion": "bedrockagent.services.k8s.aws/v1alpha1",
                    "kind": "Agent",
                    "metadata": { "name": "agent-1" },
                    "spec": { "description": "d" }
                }),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let record = cluster.get(&reference).await.unwrap().unwrap();
        let id = record["status"]["agentID"].as_str().unwrap().to_string();
        let control_plane = env.control_plane();
        assert!(control_plane.get_resource(RemoteKind::Agent, &id).await.is_ok());

        cluster
            .delete(&reference, crate::PeriodicWait::new(1, Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(control_plane.get_resource(RemoteKind::Agent, &id).await.is_ok());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(control_plane
            .get_resource(RemoteKind::Agent, &id)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
