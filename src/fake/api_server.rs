//! Tower service answering the custom resource API from the object tracker

use crate::fake::controller::SimulatedController;
use crate::fake::tracker::{ObjectKey, ObjectTracker, GVR};
use crate::Error;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use kube::client::Body as KubeBody;
use serde_json::{json, Value};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::trace;

type ServiceError = Box<dyn std::error::Error + Send + Sync>;

/// Parsed `/apis/{group}/{version}/namespaces/{namespace}/{resource}[/{name}[/status]]`
#[derive(Debug, PartialEq)]
struct ParsedPath {
    group: String,
    version: String,
    namespace: String,
    resource: String,
    name: Option<String>,
    status: bool,
}

impl ParsedPath {
    fn gvr(&self) -> GVR {
        GVR::new(&self.group, &self.version, &self.resource)
    }

    fn key(&self, name: &str) -> ObjectKey {
        ObjectKey {
            gvr: self.gvr(),
            namespace: self.namespace.clone(),
            name: name.to_string(),
        }
    }
}

/// Patch types based on Content-Type header
#[derive(Debug, Clone, Copy, PartialEq)]
enum PatchType {
    /// RFC 6902 JSON Patch - application/json-patch+json
    Json,
    /// RFC 7386 JSON Merge Patch, also used for strategic merge and apply
    Merge,
}

/// HTTP front of the fake environment. Writes to kinds the controller
/// manages are handed to it after they are stored.
#[derive(Clone)]
pub struct FakeApiServer {
    tracker: ObjectTracker,
    controller: Arc<SimulatedController>,
}

impl FakeApiServer {
    pub fn new(tracker: ObjectTracker, controller: Arc<SimulatedController>) -> Self {
        Self { tracker, controller }
    }

    fn parse_path(path: &str) -> Option<ParsedPath> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match parts.as_slice() {
            ["apis", group, version, "namespaces", namespace, resource, rest @ ..] => {
                let (name, status) = match rest {
                    [] => (None, false),
                    [name] => (Some(name.to_string()), false),
                    [name, "status"] => (Some(name.to_string()), true),
                    _ => return None,
                };
                Some(ParsedPath {
                    group: group.to_string(),
                    version: version.to_string(),
                    namespace: namespace.to_string(),
                    resource: resource.to_string(),
                    name,
                    status,
                })
            }
            _ => None,
        }
    }

    fn determine_patch_type(content_type: Option<&str>) -> PatchType {
        match content_type {
            Some(ct) if ct.contains("application/json-patch+json") => PatchType::Json,
            _ => PatchType::Merge,
        }
    }

    fn apply_patch(existing: &mut Value, patch: &Value, patch_type: PatchType) -> crate::Result<()> {
        match patch_type {
            PatchType::Json => {
                let operations: json_patch::Patch = serde_json::from_value(patch.clone())?;
                json_patch::patch(existing, &operations)
                    .map_err(|e| Error::InvalidReference(format!("invalid JSON patch: {}", e)))?;
            }
            PatchType::Merge => json_patch::merge(existing, patch),
        }
        Ok(())
    }

    async fn handle_request(&self, req: Request<KubeBody>) -> Result<Response<Full<Bytes>>, ServiceError> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = {
            use http_body_util::BodyExt;
            req.into_body().collect().await?.to_bytes()
        };

        trace!(%method, path, "fake API request");

        let Some(parsed) = Self::parse_path(&path) else {
            return Ok(Self::status_response(
                StatusCode::NOT_FOUND,
                "NotFound",
                &format!("no route for {}", path),
            ));
        };

        let result = match method {
            Method::GET => self.handle_get(&parsed),
            Method::POST => self.handle_post(&parsed, &body),
            Method::PUT => self.handle_put(&parsed, &body),
            Method::PATCH => self.handle_patch(&parsed, &body, content_type.as_deref()),
            Method::DELETE => self.handle_delete(&parsed),
            _ => {
                return Ok(Self::status_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "MethodNotAllowed",
                    "method not allowed",
                ))
            }
        };

        Ok(match result {
            Ok(value) => Self::success_response(value),
            Err(err) => Self::error_to_response(err),
        })
    }

    fn handle_get(&self, parsed: &ParsedPath) -> crate::Result<Value> {
        let gvr = parsed.gvr();
        match &parsed.name {
            Some(name) => self.tracker.get(&gvr, &parsed.namespace, name),
            None => {
                let items = self.tracker.list(&gvr, &parsed.namespace)?;
                Ok(json!({
                    "kind": "List",
                    "apiVersion": format!("{}/{}", parsed.group, parsed.version),
                    "metadata": { "resourceVersion": "1" },
                    "items": items,
                }))
            }
        }
    }

    fn handle_post(&self, parsed: &ParsedPath, body: &Bytes) -> crate::Result<Value> {
        let mut object: Value = serde_json::from_slice(body)?;
        if object.get("apiVersion").is_none() {
            object["apiVersion"] = json!(format!("{}/{}", parsed.group, parsed.version));
        }

        let created = self.tracker.create(&parsed.gvr(), object, &parsed.namespace)?;
        if let Some(name) = created.pointer("/metadata/name").and_then(Value::as_str) {
            self.controller.observe_write(&parsed.key(name))?;
        }
        Ok(created)
    }

    fn handle_put(&self, parsed: &ParsedPath, body: &Bytes) -> crate::Result<Value> {
        let name = Self::require_name(parsed)?;
        let object: Value = serde_json::from_slice(body)?;
        self.store(parsed, name, object)
    }

    fn handle_patch(
        &self,
        parsed: &ParsedPath,
        body: &Bytes,
        content_type: Option<&str>,
    ) -> crate::Result<Value> {
        let name = Self::require_name(parsed)?;
        let patch: Value = serde_json::from_slice(body)?;

        let mut existing = self.tracker.get(&parsed.gvr(), &parsed.namespace, name)?;
        Self::apply_patch(&mut existing, &patch, Self::determine_patch_type(content_type))?;
        self.store(parsed, name, existing)
    }

    fn handle_delete(&self, parsed: &ParsedPath) -> crate::Result<Value> {
        let name = Self::require_name(parsed)?;
        let deleted = self.tracker.delete(&parsed.gvr(), &parsed.namespace, name)?;
        // Finalized objects stay in the tracker until their finalizers are gone
        if self.tracker.get(&parsed.gvr(), &parsed.namespace, name).is_err() {
            self.controller.observe_delete(&parsed.key(name), &deleted);
        }
        Ok(deleted)
    }

    /// Write either the status subresource or the main resource, notifying the
    /// controller when the spec generation moved.
    fn store(&self, parsed: &ParsedPath, name: &str, object: Value) -> crate::Result<Value> {
        let gvr = parsed.gvr();

        if parsed.status {
            let status = object.get("status").cloned().unwrap_or_else(|| json!({}));
            return self.tracker.update_status(&gvr, &parsed.namespace, name, status);
        }

        let before = self.tracker.get(&gvr, &parsed.namespace, name)?;
        let updated = self.tracker.update(&gvr, &parsed.namespace, name, object)?;
        if generation(&before) != generation(&updated) {
            self.controller.observe_write(&parsed.key(name))?;
            return self.tracker.get(&gvr, &parsed.namespace, name);
        }
        Ok(updated)
    }

    fn require_name(parsed: &ParsedPath) -> crate::Result<&str> {
        parsed
            .name
            .as_deref()
            .ok_or_else(|| Error::InvalidReference("resource name is required".to_string()))
    }

    /// Convert a crate error into a Kubernetes `Status` response
    fn error_to_response(err: Error) -> Response<Full<Bytes>> {
        match err {
            Error::Kube(kube::Error::Api(response)) => {
                let status = StatusCode::from_u16(response.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                Self::status_response(status, &response.reason, &response.message)
            }
            Error::InvalidReference(message) => Self::status_response(StatusCode::BAD_REQUEST, "BadRequest", &message),
            Error::Serialization(err) => {
                Self::status_response(StatusCode::BAD_REQUEST, "BadRequest", &err.to_string())
            }
            other => Self::status_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalError",
                &other.to_string(),
            ),
        }
    }

    fn status_response(status: StatusCode, reason: &str, message: &str) -> Response<Full<Bytes>> {
        let body = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": status.as_u16(),
        });
        Self::json_response(status, &body)
    }

    fn success_response(data: Value) -> Response<Full<Bytes>> {
        Self::json_response(StatusCode::OK, &data)
    }

    fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
        *response.status_mut() = status;
        response.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        response
    }
}

fn generation(object: &Value) -> Option<i64> {
    object.pointer("/metadata/generation").and_then(Value::as_i64)
}

impl Service<Request<KubeBody>> for FakeApiServer {
    type Response = Response<Full<Bytes>>;
    type Error = ServiceError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<KubeBody>) -> Self::Future {
        let this = self.clone();
        async move { this.handle_request(req).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_variants() {
        let collection = FakeApiServer::parse_path("/apis/bedrockagent.services.k8s.aws/v1alpha1/namespaces/default/agents")
            .unwrap();
        assert_eq!(collection.resource, "agents");
        assert_eq!(collection.name, None);

        let item = FakeApiServer::parse_path("/apis/bedrockagent.services.k8s.aws/v1alpha1/namespaces/test/agents/a1")
            .unwrap();
        assert_eq!(item.namespace, "test");
        assert_eq!(item.name.as_deref(), Some("a1"));
        assert!(!item.status);

        let status =
            FakeApiServer::parse_path("/apis/bedrockagent.services.k8s.aws/v1alpha1/namespaces/test/agents/a1/status")
                .unwrap();
        assert!(status.status);

        assert!(FakeApiServer::parse_path("/api/v1/namespaces/default/pods").is_none());
        assert!(FakeApiServer::parse_path("/apis/g/v1/agents").is_none());
    }

    #[test]
    fn test_determine_patch_type() {
        assert_eq!(
            FakeApiServer::determine_patch_type(Some("application/json-patch+json")),
            PatchType::Json
        );
        assert_eq!(
            FakeApiServer::determine_patch_type(Some("application/merge-patch+json")),
            PatchType::Merge
        );
        assert_eq!(FakeApiServer::determine_patch_type(None), PatchType::Merge);
    }
}
