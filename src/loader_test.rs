#[cfg(test)]
mod tests {
    use crate::loader::*;
    use serde_json::json;
    use std::io::Write;

    fn write_template(dir: &tempfile::TempDir, name: &str, content: &str) {
        let mut file = std::fs::File::create(dir.path().join(format!("{name}.yaml"))).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn replacements(pairs: &[(&str, &str)]) -> Replacements {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_resource_overlays_replacements() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            &dir,
            "widget",
            "apiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: {{ NAME }}\nspec:\n  region: {{ REGION }}\n  size: {{ SIZE }}\n",
        );

        let loader = ResourceLoader::new(dir.path())
            .with_replacement("REGION", "us-west-2")
            .with_replacement("NAME", "base-name");

        let manifest = loader
            .load_resource("widget", &replacements(&[("NAME", "widget-1"), ("SIZE", "3")]))
            .unwrap();

        assert_eq!(manifest["metadata"]["name"], json!("widget-1"));
        assert_eq!(manifest["spec"]["region"], json!("us-west-2"));
        assert_eq!(manifest["spec"]["size"], json!(3));
    }

    #[test]
    fn test_load_resource_missing_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        write_template(&dir, "widget", "metadata:\n  name: {{ NAME }}\n");

        let result = ResourceLoader::new(dir.path()).load_resource("widget", &Replacements::new());
        assert!(matches!(result, Err(crate::Error::Template(_))));
    }

    #[test]
    fn test_load_resource_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let result = ResourceLoader::new(dir.path()).load_resource("absent", &Replacements::new());
        assert!(matches!(result, Err(crate::Error::Io { .. })));
    }

    #[test]
    fn test_bundled_agent_template() {
        let manifest = ResourceLoader::bundled()
            .load_resource(
                "agent",
                &replacements(&[
                    ("AGENT_NAME", "bedrock-test-agent-abc"),
                    ("AGENT_DESCRIPTION", "Test agent for e2e testing"),
                    ("AGENT_INSTRUCTION", "You are a helpful assistant"),
                    ("AGENT_MODEL", "us.amazon.nova-lite-v1:0"),
                    ("AGENT_ROLE_ARN", "arn:aws:iam::000000000000:role/agent"),
                    ("AGENT_PROMPT_TEMP", "0.7"),
                    ("AGENT_TOP_P", "0.9"),
                    ("AGENT_MAX_LENGTH", "2048"),
                    ("TAG_KEY_1", "test1"),
                    ("TAG_VALUE_1", "value1"),
                ]),
            )
            .unwrap();

        assert_eq!(manifest["kind"], json!("Agent"));
        assert_eq!(manifest["spec"]["description"], json!("Test agent for e2e testing"));
        assert_eq!(manifest["spec"]["tags"], json!({ "test1": "value1" }));
    }

    #[test]
    fn test_replacements_from_env() {
        let vars = vec![
            ("E2E_REPLACEMENT_AGENT_ROLE_ARN".to_string(), "arn:role".to_string()),
            ("E2E_REPLACEMENT_".to_string(), "ignored".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];

        assert_eq!(
            replacements_from_env(vars),
            replacements(&[("AGENT_ROLE_ARN", "arn:role")])
        );
    }
}
