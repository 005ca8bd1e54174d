//! Descriptors for the custom resource kinds under test

use std::fmt;

/// API group served by the Bedrock Agent controller
pub const CRD_GROUP: &str = "bedrockagent.services.k8s.aws";
/// API version served by the Bedrock Agent controller
pub const CRD_VERSION: &str = "v1alpha1";
/// Condition the controller sets once desired and remote state agree
pub const RESOURCE_SYNCED: &str = "ACK.ResourceSynced";

/// Resource type on the remote control plane backing a custom resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteKind {
    Agent,
    KnowledgeBase,
}

impl RemoteKind {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteKind::Agent => "Agent",
            RemoteKind::KnowledgeBase => "KnowledgeBase",
        }
    }

    /// Name of the read operation used to observe the resource
    pub fn get_operation(&self) -> &'static str {
        match self {
            RemoteKind::Agent => "GetAgent",
            RemoteKind::KnowledgeBase => "GetKnowledgeBase",
        }
    }

    /// Resource type segment of the ARN
    pub fn arn_resource_type(&self) -> &'static str {
        match self {
            RemoteKind::Agent => "agent",
            RemoteKind::KnowledgeBase => "knowledge-base",
        }
    }

    /// Key holding the provider-assigned identifier in a remote record
    pub fn id_key(&self) -> &'static str {
        match self {
            RemoteKind::Agent => "agentId",
            RemoteKind::KnowledgeBase => "knowledgeBaseId",
        }
    }

    /// Key holding the ARN in a remote record
    pub fn arn_key(&self) -> &'static str {
        match self {
            RemoteKind::Agent => "agentArn",
            RemoteKind::KnowledgeBase => "knowledgeBaseArn",
        }
    }
}

impl fmt::Display for RemoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of a custom resource kind managed by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKind {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    /// Explicit plural, derived from `kind` when `None`
    pub plural: Option<&'static str>,
    /// Manifest template name understood by the loader
    pub template: &'static str,
    /// Field under `status` carrying the provider-assigned identifier
    pub id_field: &'static str,
    /// Whether `status.ackResourceMetadata.arn` must be populated
    pub requires_arn: bool,
    pub remote: RemoteKind,
}

impl ResourceKind {
    pub fn plural(&self) -> String {
        match self.plural {
            Some(plural) => plural.to_string(),
            None => pluralize(self.kind),
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

pub const AGENT: ResourceKind = ResourceKind {
    group: CRD_GROUP,
    version: CRD_VERSION,
    kind: "Agent",
    plural: None,
    template: "agent",
    id_field: "agentID",
    requires_arn: false,
    remote: RemoteKind::Agent,
};

pub const KNOWLEDGE_BASE: ResourceKind = ResourceKind {
    group: CRD_GROUP,
    version: CRD_VERSION,
    kind: "KnowledgeBase",
    plural: None,
    template: "knowledge_base",
    id_field: "knowledgeBaseID",
    requires_arn: true,
    remote: RemoteKind::KnowledgeBase,
};

/// Pluralize a Kubernetes Kind name to its resource plural form.
///
/// Follows the kube-rs rules so plurals line up with what the API server
/// registers for a CRD:
/// - Words ending in s, x, z, ch, sh get -es suffix
/// - Words ending in consonant+y get -ies suffix
/// - All other words get -s suffix
pub fn pluralize(kind: &str) -> String {
    let word = kind.to_ascii_lowercase();

    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }

    if word.len() > 1 && word.ends_with('y') {
        if let Some(c) = word.chars().nth(word.len() - 2) {
            if !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u') {
                return format!("{}ies", &word[..word.len() - 1]);
            }
        }
    }

    format!("{word}s")
}
