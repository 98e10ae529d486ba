//! Removal of a resource together with the entities that depend on it.
//!
//! Removal is shallow. Removing `X` also removes every top-level entity that
//! refers to `X`, but not the entities that refer to those dependents. A
//! caller that wants the full closure passes each returned dependent to
//! [`remove_dependents`] until nothing more is removed.

use log::{debug, info};

use stackpatch_core::Document;

use crate::references;

/// Removes the resource `name` and every top-level entity that refers to it.
///
/// Returns `false` without changing anything if `name` is not a key of the
/// `Resources` section.
pub fn remove_resource(doc: &mut Document, name: &str) -> bool {
    remove_with_dependents(doc, name).is_some()
}

/// Like [`remove_resource`], but returns the names of the removed
/// dependents, or `None` if `name` is not a resource.
pub fn remove_with_dependents(doc: &mut Document, name: &str) -> Option<Vec<String>> {
    let resources = doc.resources_mut()?;
    if resources.remove(name).is_none() {
        debug!(resource = name; "Resource not found, nothing to remove");
        return None;
    }
    info!(resource = name; "Removed resource");
    doc.mark_dirty();

    Some(remove_dependents(doc, name))
}

/// Removes every entity of every top-level mapping section whose subtree
/// refers to `name`, and returns their names in document order.
///
/// `name` itself need not exist, so this also cleans up references left
/// dangling by an earlier removal.
pub fn remove_dependents(doc: &mut Document, name: &str) -> Vec<String> {
    let mut removed = Vec::new();
    let Some(root) = doc.root_mut().as_mapping_mut() else {
        return removed;
    };

    for (section, node) in root.iter_mut() {
        let Some(entities) = node.as_mapping_mut() else {
            continue;
        };
        let dependents: Vec<String> = entities
            .iter()
            .filter(|(_, entity)| references::has_reference(entity, name))
            .map(|(key, _)| key.to_string())
            .collect();

        for dependent in dependents {
            entities.remove(&dependent);
            info!(section = section, dependent:% = dependent, target = name; "Removed dependent");
            removed.push(dependent);
        }
    }

    if !removed.is_empty() {
        doc.mark_dirty();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{load_json, load_yaml, write_yaml};

    #[test]
    fn test_missing_resource_is_a_no_op() {
        let mut doc = load_yaml("Resources:\n  A: {}\nOutputs:\n  X:\n    Value: !Ref B\n");
        assert!(!remove_resource(&mut doc, "B"));
        assert!(!doc.is_dirty());

        let mut no_resources = load_yaml("Parameters:\n  B:\n    Type: String\n");
        assert!(!remove_resource(&mut no_resources, "B"));
        let parameters = no_resources.section(stackpatch_core::Section::Parameters);
        assert!(parameters.is_some());
    }

    #[test]
    fn test_removes_dependents_in_every_section() {
        let mut doc = load_yaml(
            r#"Resources:
  AMI:
    Type: Custom::AMI
  EC2Instance:
    Properties:
      ImageId: !Ref AMI
  Unrelated:
    Type: AWS::S3::Bucket
Outputs:
  Arn:
    Value: !GetAtt AMI.Arn
  Kept:
    Value: !Ref Unrelated
"#,
        );

        let removed = remove_with_dependents(&mut doc, "AMI").expect("AMI exists");

        assert_eq!(removed, ["EC2Instance", "Arn"]);
        assert!(doc.is_dirty());
        assert_eq!(
            write_yaml(&doc),
            "Resources:\n  Unrelated:\n    Type: AWS::S3::Bucket\nOutputs:\n  Kept:\n    Value: !Ref Unrelated\n"
        );
    }

    #[test]
    fn test_removal_is_single_pass() {
        let mut doc = load_yaml(
            "Resources:\n  X: {}\n  Y:\n    Ref: X\n  Z:\n    Value: !GetAtt Y.Arn\n",
        );

        assert!(remove_resource(&mut doc, "X"));
        let resources = doc.resources().expect("resources");
        assert!(!resources.contains_key("Y"));
        assert!(resources.contains_key("Z"));

        // Y is gone, so asking to remove it again changes nothing.
        assert!(!remove_resource(&mut doc, "Y"));
        assert_eq!(remove_dependents(&mut doc, "Y"), ["Z"]);
        assert!(doc.resources().is_some_and(|r| r.is_empty()));
    }

    #[test]
    fn test_substitution_and_nested_references() {
        let mut doc = load_yaml(
            r#"Resources:
  AMI:
    Type: Custom::AMI
  Subbed:
    ImageId: !Sub '${AMI}'
  Escaped:
    ImageId: !Sub '${!AMI}'
  Listed:
    ImageId: !Sub
      - '${AmiReference}'
      - AmiReference: !Ref AMI
  Nested:
    ImageIds:
      - Ref: AMI
      - Ref: None
"#,
        );

        let removed = remove_with_dependents(&mut doc, "AMI").expect("AMI exists");
        assert_eq!(removed, ["Subbed", "Listed", "Nested"]);
        assert!(doc.resources().is_some_and(|r| r.contains_key("Escaped")));
    }

    #[test]
    fn test_json_explicit_forms() {
        let mut doc = load_json(
            r#"{"Resources": {"AMI": {}, "A": {"Fn::GetAtt": ["AMI", "Arn"]}, "B": {"Fn::Sub": ["${R}", {"R": {"Ref": "AMI"}}]}, "C": {"Fn::GetAtt": "AMI.Arn"}}}"#,
        );

        let removed = remove_with_dependents(&mut doc, "AMI").expect("AMI exists");
        assert_eq!(removed, ["A", "B", "C"]);
        assert!(doc.resources().is_some_and(|r| r.is_empty()));
    }
}
