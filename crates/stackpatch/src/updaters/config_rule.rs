use log::{debug, info, warn};

use stackpatch_core::{Document, Node, Scalar, ScalarStyle};

use super::{TemplateUpdater, ensure_mapping, ensure_properties, resource_type};
use crate::StackpatchError;

const CONFIG_RULE: &str = "AWS::Config::ConfigRule";
const CUSTOM_POLICY: &str = "CUSTOM_POLICY";

/// Replaces the Guard policy of a custom policy Config rule.
///
/// The policy is written as `Properties.Source.CustomPolicyDetails.PolicyText`
/// in a literal block scalar. Other details, such as the policy runtime, are
/// kept. Rules whose source is not owned by `CUSTOM_POLICY` are left alone.
#[derive(Debug, Clone)]
pub struct ConfigRulePolicyUpdater {
    resource: String,
    policy: String,
}

impl ConfigRulePolicyUpdater {
    pub fn new(resource: impl Into<String>, policy: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            policy: policy.into(),
        }
    }
}

fn is_custom_policy(resource: &Node) -> bool {
    resource_type(resource) == Some(CONFIG_RULE)
        && resource
            .get_path(&["Properties", "Source", "Owner"])
            .and_then(Node::as_str)
            == Some(CUSTOM_POLICY)
}

impl TemplateUpdater for ConfigRulePolicyUpdater {
    fn update(&mut self, doc: &mut Document) -> Result<(), StackpatchError> {
        let name = self.resource.as_str();
        let Some(resource) = doc
            .resources_mut()
            .and_then(|resources| resources.get_mut(name))
        else {
            debug!(resource = name; "Config rule not in template");
            return Ok(());
        };

        if !is_custom_policy(resource) {
            warn!(resource = name; "Resource is not a {CUSTOM_POLICY} of type {CONFIG_RULE}");
            return Ok(());
        }

        let current = resource
            .get_path(&["Properties", "Source", "CustomPolicyDetails", "PolicyText"])
            .and_then(Node::as_str);
        if current == Some(self.policy.as_str()) {
            debug!(resource = name; "Policy text is up to date");
            return Ok(());
        }

        let Some(details) = ensure_properties(resource)
            .and_then(|properties| ensure_mapping(properties, "Source"))
            .and_then(|source| ensure_mapping(source, "CustomPolicyDetails"))
        else {
            warn!(resource = name; "CustomPolicyDetails is not a mapping");
            return Ok(());
        };
        details.insert(
            "PolicyText",
            Scalar::string(self.policy.as_str()).with_style(ScalarStyle::Literal),
        );

        info!(resource = name; "Updated policy text of config rule");
        doc.mark_dirty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{load_yaml, resource_str, write_yaml};

    const POLICY: &str = "let buckets = Resources.*[ Type == \"AWS::S3::Bucket\" ]\n";

    #[test]
    fn test_adds_policy_text() {
        let mut doc = load_yaml(
            r#"Resources:
  ConfigRule:
    Type: AWS::Config::ConfigRule
    Properties:
      Source:
        Owner: CUSTOM_POLICY
        CustomPolicyDetails:
          EnableDebugLogDelivery: true
          PolicyRuntime: guard-2.x.x
"#,
        );
        let mut updater = ConfigRulePolicyUpdater::new("ConfigRule", POLICY);

        updater.update(&mut doc).expect("update succeeds");

        assert!(doc.is_dirty());
        assert_eq!(
            write_yaml(&doc),
            r#"Resources:
  ConfigRule:
    Type: AWS::Config::ConfigRule
    Properties:
      Source:
        Owner: CUSTOM_POLICY
        CustomPolicyDetails:
          EnableDebugLogDelivery: true
          PolicyRuntime: guard-2.x.x
          PolicyText: |
            let buckets = Resources.*[ Type == "AWS::S3::Bucket" ]
"#
        );
    }

    #[test]
    fn test_replaces_policy_text_and_adds_details() {
        let mut doc = load_yaml(
            "Resources:\n  Existing:\n    Type: AWS::Config::ConfigRule\n    Properties:\n      Source:\n        Owner: CUSTOM_POLICY\n        CustomPolicyDetails:\n          PolicyText: Existing Policy\n  Bare:\n    Type: AWS::Config::ConfigRule\n    Properties:\n      Source:\n        Owner: CUSTOM_POLICY\n",
        );

        for name in ["Existing", "Bare"] {
            ConfigRulePolicyUpdater::new(name, POLICY)
                .update(&mut doc)
                .expect("update succeeds");
            assert_eq!(
                resource_str(
                    &doc,
                    &[name, "Properties", "Source", "CustomPolicyDetails", "PolicyText"],
                ),
                Some(POLICY)
            );
        }
        assert!(doc.is_dirty());
    }

    #[test]
    fn test_same_policy_is_a_no_op() {
        let mut doc = load_yaml(
            "Resources:\n  ConfigRule:\n    Type: AWS::Config::ConfigRule\n    Properties:\n      Source:\n        Owner: CUSTOM_POLICY\n        CustomPolicyDetails:\n          PolicyText: |\n            rule r {}\n",
        );

        ConfigRulePolicyUpdater::new("ConfigRule", "rule r {}\n")
            .update(&mut doc)
            .expect("update succeeds");
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_other_rules_are_ignored() {
        let mut doc = load_yaml(
            "Resources:\n  Managed:\n    Type: AWS::Config::ConfigRule\n    Properties:\n      Source:\n        Owner: AWS\n  Instance:\n    Type: AWS::EC2::Instance\n",
        );

        for name in ["Managed", "Instance", "Missing"] {
            ConfigRulePolicyUpdater::new(name, POLICY)
                .update(&mut doc)
                .expect("update succeeds");
        }

        assert!(!doc.is_dirty());
        assert!(resource_str(&doc, &["Instance", "Properties"]).is_none());
    }
}
