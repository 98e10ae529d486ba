//! Template updaters.
//!
//! Each updater implements [`TemplateUpdater`] and is driven over files by
//! [`Runner`](crate::runner::Runner).

mod config_rule;
mod container_image;
mod lambda_inline_code;
mod lambda_s3_key;
mod latest_ami;
mod new_resources;
mod remove_resource;
mod rest_api_body;
mod state_machine;

pub use config_rule::ConfigRulePolicyUpdater;
pub use container_image::ContainerImageUpdater;
pub use lambda_inline_code::LambdaInlineCodeUpdater;
pub use lambda_s3_key::LambdaS3KeyUpdater;
pub use latest_ami::LatestAmiUpdater;
pub use new_resources::NewResourcesAdder;
pub use remove_resource::ResourceRemover;
pub use rest_api_body::{RestApiBodyUpdater, load_rest_api_body};
pub use state_machine::StateMachineDefinitionUpdater;

use stackpatch_core::{Document, Mapping, Node, ScalarKind};

use crate::StackpatchError;

/// A change applied to every template of a run.
///
/// Updaters mark the document dirty when they change it; a clean document is
/// not written back.
pub trait TemplateUpdater {
    /// Called once before any file is read. Lookups that do not depend on a
    /// template belong here so a failure leaves every file untouched.
    ///
    /// # Errors
    ///
    /// An error aborts the run.
    fn prepare(&mut self) -> Result<(), StackpatchError> {
        Ok(())
    }

    /// Applies the change to one template.
    ///
    /// # Errors
    ///
    /// An error aborts the run; files already written stay written.
    fn update(&mut self, doc: &mut Document) -> Result<(), StackpatchError>;
}

/// Checks that `name` can be the logical ID of a resource.
///
/// Logical IDs are 1 to 255 ASCII letters and digits.
///
/// # Errors
///
/// Returns [`StackpatchError::InvalidArgument`] for any other name.
pub fn check_resource_name(name: &str) -> Result<(), StackpatchError> {
    if (1..=255).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Ok(());
    }
    Err(StackpatchError::InvalidArgument(format!(
        "{name:?} is not a valid resource name, expected 1 to 255 letters and digits"
    )))
}

/// The `Type` of a resource definition.
pub(crate) fn resource_type(resource: &Node) -> Option<&str> {
    resource.get("Type").and_then(Node::as_str)
}

/// The `Properties` mapping of a resource, created if it is absent or null.
///
/// Returns `None` if the resource or its properties are not mappings.
pub(crate) fn ensure_properties(resource: &mut Node) -> Option<&mut Mapping> {
    ensure_mapping(resource.as_mapping_mut()?, "Properties")
}

/// The mapping under `key`, created if the key is absent or holds null.
pub(crate) fn ensure_mapping<'a>(parent: &'a mut Mapping, key: &str) -> Option<&'a mut Mapping> {
    let missing = match parent.get(key) {
        None => true,
        Some(node) => node
            .as_scalar()
            .is_some_and(|scalar| scalar.kind() == ScalarKind::Null),
    };
    if missing {
        parent.insert(key, Mapping::new());
    }
    parent.get_mut(key).and_then(Node::as_mapping_mut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{load_yaml, write_yaml};

    #[test]
    fn test_ensure_properties() {
        let mut doc =
            load_yaml("Resources:\n  A:\n    Type: X\n  B:\n    Type: Y\n    Properties:\n");

        for name in ["A", "B"] {
            let resource = doc
                .resources_mut()
                .and_then(|resources| resources.get_mut(name))
                .expect("resource exists");
            assert_eq!(
                resource_type(resource),
                Some(if name == "A" { "X" } else { "Y" })
            );
            ensure_properties(resource)
                .expect("properties mapping")
                .insert("Key", "value");
        }

        assert_eq!(
            write_yaml(&doc),
            "Resources:\n  A:\n    Type: X\n    Properties:\n      Key: value\n  B:\n    Type: Y\n    Properties:\n      Key: value\n"
        );
    }

    #[test]
    fn test_check_resource_name() {
        for name in ["Bucket", "CustomAMIv2", "A1"] {
            assert!(check_resource_name(name).is_ok(), "{name} is valid");
        }
        for name in ["", "A.B", "My-Bucket", "Api v2", "Bücket"] {
            let err = check_resource_name(name).expect_err("invalid name");
            assert!(matches!(err, StackpatchError::InvalidArgument(_)));
        }
        assert!(check_resource_name(&"A".repeat(256)).is_err());
    }

    #[test]
    fn test_nested_mapping_is_created() {
        let mut doc = load_yaml("Resources:\n  A:\n    Properties:\n      Source:\n");
        let properties = doc
            .resources_mut()
            .and_then(|resources| resources.get_mut("A"))
            .and_then(ensure_properties)
            .expect("properties mapping");

        ensure_mapping(properties, "Source")
            .and_then(|source| ensure_mapping(source, "Details"))
            .expect("details mapping")
            .insert("Key", "value");

        assert_eq!(
            write_yaml(&doc),
            "Resources:\n  A:\n    Properties:\n      Source:\n        Details:\n          Key: value\n"
        );
    }

    #[test]
    fn test_properties_of_wrong_kind() {
        let mut doc = load_yaml("Resources:\n  A:\n    Properties: [1]\n");
        let resource = doc
            .resources_mut()
            .and_then(|resources| resources.get_mut("A"))
            .expect("resource exists");
        assert!(resource_type(resource).is_none());
        assert!(ensure_properties(resource).is_none());
    }
}
