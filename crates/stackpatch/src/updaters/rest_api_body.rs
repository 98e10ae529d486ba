use std::path::Path;

use log::{debug, info};

use stackpatch_core::{Document, Node, decor::Layout};
use stackpatch_parser::LoaderConfig;

use super::{TemplateUpdater, ensure_properties, resource_type};
use crate::{
    StackpatchError, merge,
    runner::load_path,
    versions::{self, VersionedName},
};

const REST_API: &str = "AWS::ApiGateway::RestApi";

/// Sets the `Body` of an API Gateway REST API.
///
/// The resource is named by its base name; `Api`, `Apiv1` and `Apiv2` are
/// versions of the same API and the one with the highest ordinal is
/// compared against the new body. A body that is already current leaves the
/// template untouched.
///
/// With [`with_new_version`] the new body is written to a new version of the
/// API, which takes over the references to the old one so that a new
/// deployment is forced. Only the newest `keep` versions are retained.
///
/// [`with_new_version`]: RestApiBodyUpdater::with_new_version
#[derive(Debug, Clone)]
pub struct RestApiBodyUpdater {
    resource: String,
    body: Node,
    add_new_version: bool,
    keep: usize,
}

impl RestApiBodyUpdater {
    pub fn new(resource: impl Into<String>, body: Node) -> Self {
        Self {
            resource: resource.into(),
            body: nested(body),
            add_new_version: false,
            keep: 1,
        }
    }

    pub fn with_new_version(mut self, add_new_version: bool) -> Self {
        self.add_new_version = add_new_version;
        self
    }

    /// Number of versions to retain when adding a new version, at least one.
    pub fn with_keep(mut self, keep: usize) -> Self {
        self.keep = keep.max(1);
        self
    }

    pub fn body(&self) -> &Node {
        &self.body
    }

    fn is_member(&self, name: &str, resource: &Node) -> bool {
        resource_type(resource) == Some(REST_API)
            && (name == self.resource || VersionedName::parse(name).base() == self.resource)
    }
}

/// Loads an OpenAPI specification and merges the API Gateway extensions
/// into it.
///
/// # Errors
///
/// Returns an error if either file cannot be read or parsed.
pub fn load_rest_api_body(
    open_api_specification: &Path,
    api_gateway_extensions: &Path,
    config: LoaderConfig,
) -> Result<Node, StackpatchError> {
    let mut body = load_path(open_api_specification, config)?;
    let extensions = load_path(api_gateway_extensions, config)?;
    merge::deep_merge(body.root_mut(), extensions.root());
    Ok(body.root().clone())
}

/// Lets the writer choose the indentation of a document root that is moved
/// below a key.
fn nested(mut body: Node) -> Node {
    match &mut body {
        Node::Mapping(mapping) if !mapping.layout().is_flow() => {
            mapping.set_layout(Layout::block())
        }
        Node::Sequence(sequence) if !sequence.layout().is_flow() => {
            sequence.set_layout(Layout::block())
        }
        _ => {}
    }
    body
}

fn set_body(resource: &mut Node, body: &Node) -> bool {
    let Some(properties) = ensure_properties(resource) else {
        return false;
    };
    if properties.get("Body").is_some_and(|current| current.content_eq(body)) {
        return false;
    }
    properties.insert("Body", body.clone());
    true
}

impl TemplateUpdater for RestApiBodyUpdater {
    fn update(&mut self, doc: &mut Document) -> Result<(), StackpatchError> {
        let names: Vec<&str> = match doc.resources() {
            Some(resources) => resources
                .iter()
                .filter(|(name, resource)| self.is_member(name, resource))
                .map(|(name, _)| name)
                .collect(),
            None => Vec::new(),
        };
        let Some(mut family) = versions::families(names).into_iter().next() else {
            debug!(resource = self.resource.as_str(); "REST API not in template");
            return Ok(());
        };
        let Some(current) = family.current().map(str::to_string) else {
            return Ok(());
        };

        if self.add_new_version {
            let added = versions::add_version(doc, &mut family, |copy| set_body(copy, &self.body));
            if added.is_some() {
                let removed = versions::prune(doc, &mut family, self.keep);
                debug!(resource = self.resource.as_str(), removed = removed.len(); "Pruned old versions");
            }
            return Ok(());
        }

        let Some(resource) = doc
            .resources_mut()
            .and_then(|resources| resources.get_mut(&current))
        else {
            return Ok(());
        };
        if set_body(resource, &self.body) {
            info!(resource = current.as_str(); "Updated REST API body");
            doc.mark_dirty();
        } else {
            debug!(resource = current.as_str(); "REST API body is up to date");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::{load_yaml, resource_str, write_yaml};

    const TEMPLATE: &str = r#"AWSTemplateFormatVersion: '2010-09-09'
Resources:
  Api:
    Type: AWS::ApiGateway::RestApi
    Properties:
      Name: pets
      Body:
        openapi: 3.0.0
  Deployment:
    Type: AWS::ApiGateway::Deployment
    Properties:
      RestApiId: !Ref Api
"#;

    fn body(source: &str) -> Node {
        load_yaml(source).root().clone()
    }

    #[test]
    fn test_update_in_place() {
        let mut doc = load_yaml(TEMPLATE);
        let mut updater = RestApiBodyUpdater::new("Api", body("openapi: 3.0.1\npaths: {}\n"));

        updater.update(&mut doc).expect("update succeeds");

        assert!(doc.is_dirty());
        assert_eq!(
            write_yaml(&doc),
            TEMPLATE.replace(
                "        openapi: 3.0.0\n",
                "        openapi: 3.0.1\n        paths: {}\n",
            )
        );
    }

    #[test]
    fn test_same_body_is_a_no_op() {
        let mut doc = load_yaml(TEMPLATE);
        let mut updater =
            RestApiBodyUpdater::new("Api", body("openapi: 3.0.0\n")).with_new_version(true);

        updater.update(&mut doc).expect("update succeeds");
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_new_version_replaces_old() {
        let mut doc = load_yaml(TEMPLATE);
        let mut updater =
            RestApiBodyUpdater::new("Api", body("openapi: 3.0.1\n")).with_new_version(true);

        updater.update(&mut doc).expect("update succeeds");

        let names: Vec<&str> = doc.resources().expect("resources").keys().collect();
        assert_eq!(names, ["Apiv1", "Deployment"]);
        assert_eq!(
            resource_str(&doc, &["Deployment", "Properties", "RestApiId"]),
            Some("Apiv1")
        );
        assert_eq!(
            resource_str(&doc, &["Apiv1", "Properties", "Body", "openapi"]),
            Some("3.0.1")
        );
    }

    #[test]
    fn test_new_version_keeps_previous() {
        let template = TEMPLATE
            .replace("  Api:\n", "  Apiv3:\n")
            .replace("!Ref Api", "!Ref Apiv3");
        let mut doc = load_yaml(&template);
        let mut updater = RestApiBodyUpdater::new("Api", body("openapi: 3.0.1\n"))
            .with_new_version(true)
            .with_keep(2);

        updater.update(&mut doc).expect("update succeeds");
        let names: Vec<&str> = doc.resources().expect("resources").keys().collect();
        assert_eq!(names, ["Apiv3", "Apiv4", "Deployment"]);

        doc.mark_clean();
        let mut updater = RestApiBodyUpdater::new("Api", body("openapi: 3.0.2\n"))
            .with_new_version(true)
            .with_keep(2);
        updater.update(&mut doc).expect("update succeeds");
        let names: Vec<&str> = doc.resources().expect("resources").keys().collect();
        assert_eq!(names, ["Apiv4", "Apiv5", "Deployment"]);
        assert_eq!(
            resource_str(&doc, &["Deployment", "Properties", "RestApiId"]),
            Some("Apiv5")
        );
    }

    #[test]
    fn test_load_body_merges_extensions() {
        let dir = tempdir().expect("temp dir");
        let spec = dir.path().join("openapi.yaml");
        let extensions = dir.path().join("extensions.json");
        fs::write(
            &spec,
            "openapi: 3.0.0\npaths:\n  /pets:\n    get:\n      summary: List\n",
        )
        .expect("write");
        fs::write(
            &extensions,
            r#"{"paths": {"/pets": {"get": {"x-amazon-apigateway-integration": {"type": "mock"}}}}}"#,
        )
        .expect("write");

        let body =
            load_rest_api_body(&spec, &extensions, LoaderConfig::default()).expect("body loads");

        assert_eq!(
            body.get_path(&["paths", "/pets", "get", "summary"])
                .and_then(Node::as_str),
            Some("List")
        );
        assert_eq!(
            body.get_path(&["paths", "/pets", "get", "x-amazon-apigateway-integration", "type"])
                .and_then(Node::as_str),
            Some("mock")
        );
    }
}
