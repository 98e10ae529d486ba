use log::{debug, info, warn};

use stackpatch_core::{Document, Mapping, Node, Scalar, ScalarStyle, Tag};

use super::{TemplateUpdater, ensure_properties, resource_type};
use crate::StackpatchError;

const STATE_MACHINE: &str = "AWS::StepFunctions::StateMachine";
const DEFINITION: &str = "DefinitionString";
const FN_SUB: &str = "Fn::Sub";

/// Replaces the definition of a Step Functions state machine.
///
/// By default the definition is wrapped in `Fn::Sub` so it can refer to
/// parameters and resource attributes of the template. An existing `!Sub`
/// short form is kept as it is written.
#[derive(Debug, Clone)]
pub struct StateMachineDefinitionUpdater {
    resource: String,
    definition: String,
    fn_sub: bool,
}

impl StateMachineDefinitionUpdater {
    pub fn new(resource: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            definition: definition.into(),
            fn_sub: true,
        }
    }

    /// Whether to wrap the definition in `Fn::Sub`.
    pub fn with_fn_sub(mut self, fn_sub: bool) -> Self {
        self.fn_sub = fn_sub;
        self
    }

    fn literal(&self) -> Scalar {
        Scalar::string(self.definition.as_str()).with_style(ScalarStyle::Literal)
    }

    fn is_current(&self, node: Option<&Node>) -> bool {
        let definition = Some(self.definition.as_str());
        match node {
            None => false,
            Some(node) if !self.fn_sub => node.tag().is_none() && node.as_str() == definition,
            Some(Node::Scalar(scalar)) => {
                scalar.tag() == Some(&Tag::Sub) && scalar.as_str() == definition
            }
            Some(node) => node.get(FN_SUB).and_then(Node::as_str) == definition,
        }
    }

    /// Writes the new definition into `properties`, keeping a `!Sub` tag on
    /// the current value.
    fn apply(&self, properties: &mut Mapping) {
        if self.fn_sub {
            if let Some(scalar) = properties
                .get_mut(DEFINITION)
                .and_then(Node::as_scalar_mut)
                .filter(|scalar| scalar.tag() == Some(&Tag::Sub))
            {
                scalar.set_value(self.definition.as_str());
                scalar.set_style(ScalarStyle::Literal);
                return;
            }
            let mut sub = Mapping::new();
            sub.insert(FN_SUB, self.literal());
            properties.insert(DEFINITION, sub);
        } else {
            properties.insert(DEFINITION, self.literal());
        }
    }
}

impl TemplateUpdater for StateMachineDefinitionUpdater {
    fn update(&mut self, doc: &mut Document) -> Result<(), StackpatchError> {
        let name = self.resource.as_str();
        let Some(resource) = doc
            .resources_mut()
            .and_then(|resources| resources.get_mut(name))
        else {
            debug!(resource = name; "State machine not in template");
            return Ok(());
        };

        if resource_type(resource) != Some(STATE_MACHINE) {
            warn!(resource = name; "Resource is not of type {STATE_MACHINE}");
            return Ok(());
        }
        if self.is_current(resource.get_path(&["Properties", DEFINITION])) {
            debug!(resource = name; "State machine definition is up to date");
            return Ok(());
        }

        let Some(properties) = ensure_properties(resource) else {
            warn!(resource = name; "Properties is not a mapping");
            return Ok(());
        };
        self.apply(properties);

        info!(resource = name, fn_sub = self.fn_sub; "Updated state machine definition");
        doc.mark_dirty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{load_yaml, write_yaml};

    const DEFINITION_JSON: &str = "{\n  \"StartAt\": \"Run\",\n  \"States\": {\"Run\": {\"Type\": \"Task\", \"Resource\": \"${Function.Arn}\", \"End\": true}}\n}\n";

    fn template(definition: &str) -> String {
        format!(
            "Resources:\n  Machine:\n    Type: AWS::StepFunctions::StateMachine\n    Properties:\n      RoleArn: !GetAtt Role.Arn\n{definition}"
        )
    }

    #[test]
    fn test_wraps_definition_in_fn_sub() {
        let mut doc = load_yaml(&template("      DefinitionString: '{}'\n"));
        let mut updater = StateMachineDefinitionUpdater::new("Machine", DEFINITION_JSON);

        updater.update(&mut doc).expect("update succeeds");

        assert!(doc.is_dirty());
        assert_eq!(
            write_yaml(&doc),
            template(
                "      DefinitionString:\n        Fn::Sub: |\n          {\n            \"StartAt\": \"Run\",\n            \"States\": {\"Run\": {\"Type\": \"Task\", \"Resource\": \"${Function.Arn}\", \"End\": true}}\n          }\n"
            )
        );

        doc.mark_clean();
        updater.update(&mut doc).expect("second update succeeds");
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_keeps_short_sub_form() {
        let mut doc = load_yaml(&template("      DefinitionString: !Sub '{}'\n"));
        let mut updater = StateMachineDefinitionUpdater::new("Machine", "{\"StartAt\": \"A\"}\n");

        updater.update(&mut doc).expect("update succeeds");

        assert_eq!(
            write_yaml(&doc),
            template("      DefinitionString: !Sub |\n        {\"StartAt\": \"A\"}\n")
        );

        doc.mark_clean();
        updater.update(&mut doc).expect("second update succeeds");
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_without_fn_sub() {
        let mut doc = load_yaml(&template("      DefinitionString:\n        Fn::Sub: '{}'\n"));
        let mut updater =
            StateMachineDefinitionUpdater::new("Machine", "{}").with_fn_sub(false);

        updater.update(&mut doc).expect("update succeeds");

        assert_eq!(
            write_yaml(&doc),
            template("      DefinitionString: |-\n        {}\n")
        );
    }

    #[test]
    fn test_other_type_is_left_alone() {
        let mut doc = load_yaml("Resources:\n  Machine:\n    Type: AWS::Lambda::Function\n");
        StateMachineDefinitionUpdater::new("Machine", "{}")
            .update(&mut doc)
            .expect("update succeeds");
        assert!(!doc.is_dirty());
    }
}
