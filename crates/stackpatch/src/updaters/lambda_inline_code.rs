use log::{debug, info, warn};

use stackpatch_core::{Document, Mapping, Node, Scalar, ScalarStyle};

use super::{TemplateUpdater, ensure_properties, resource_type};
use crate::StackpatchError;

const LAMBDA_FUNCTION: &str = "AWS::Lambda::Function";

/// Replaces the inline code of a Lambda function.
///
/// The code is written as `Properties.Code.ZipFile` in a literal block
/// scalar, replacing any other `Code` properties such as an S3 location.
#[derive(Debug, Clone)]
pub struct LambdaInlineCodeUpdater {
    resource: String,
    code: String,
}

impl LambdaInlineCodeUpdater {
    pub fn new(resource: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            code: code.into(),
        }
    }
}

impl TemplateUpdater for LambdaInlineCodeUpdater {
    fn update(&mut self, doc: &mut Document) -> Result<(), StackpatchError> {
        let name = self.resource.as_str();
        let Some(resource) = doc
            .resources_mut()
            .and_then(|resources| resources.get_mut(name))
        else {
            debug!(resource = name; "Lambda function not in template");
            return Ok(());
        };

        if resource_type(resource) != Some(LAMBDA_FUNCTION) {
            warn!(resource = name; "Resource is not of type {LAMBDA_FUNCTION}");
            return Ok(());
        }

        let current = resource
            .get_path(&["Properties", "Code", "ZipFile"])
            .and_then(Node::as_str);
        if current == Some(self.code.as_str()) {
            debug!(resource = name; "Inline code is up to date");
            return Ok(());
        }

        let Some(properties) = ensure_properties(resource) else {
            warn!(resource = name; "Properties is not a mapping");
            return Ok(());
        };
        let mut code = Mapping::new();
        code.insert(
            "ZipFile",
            Scalar::string(self.code.as_str()).with_style(ScalarStyle::Literal),
        );
        properties.insert("Code", code);

        info!(resource = name; "Updated inline code");
        doc.mark_dirty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{load_yaml, resource_str, write_yaml};

    const CODE: &str = "import boto3\n\ndef handler(event, context):\n    return {}\n";

    #[test]
    fn test_replaces_code() {
        let mut doc = load_yaml(
            r#"Resources:
  Provider:
    Type: AWS::Lambda::Function
    Properties:
      Handler: index.handler
      Code:
        S3Bucket: artifacts
        S3Key: provider.zip
      Runtime: python3.12
"#,
        );
        let mut updater = LambdaInlineCodeUpdater::new("Provider", CODE);

        updater.update(&mut doc).expect("update succeeds");

        assert!(doc.is_dirty());
        assert_eq!(
            write_yaml(&doc),
            r#"Resources:
  Provider:
    Type: AWS::Lambda::Function
    Properties:
      Handler: index.handler
      Code:
        ZipFile: |
          import boto3

          def handler(event, context):
              return {}
      Runtime: python3.12
"#
        );
    }

    #[test]
    fn test_adds_properties() {
        let mut doc = load_yaml("Resources:\n  Provider:\n    Type: AWS::Lambda::Function\n");
        let mut updater = LambdaInlineCodeUpdater::new("Provider", "exit 0");

        updater.update(&mut doc).expect("update succeeds");

        assert_eq!(
            resource_str(&doc, &["Provider", "Properties", "Code", "ZipFile"]),
            Some("exit 0")
        );
        assert_eq!(
            write_yaml(&doc),
            "Resources:\n  Provider:\n    Type: AWS::Lambda::Function\n    Properties:\n      Code:\n        ZipFile: |-\n          exit 0\n"
        );
    }

    #[test]
    fn test_same_code_is_a_no_op() {
        let mut doc = load_yaml(
            "Resources:\n  Provider:\n    Type: AWS::Lambda::Function\n    Properties:\n      Code:\n        ZipFile: |\n          exit 0\n",
        );
        let mut updater = LambdaInlineCodeUpdater::new("Provider", "exit 0\n");

        updater.update(&mut doc).expect("update succeeds");
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_other_types_and_missing_resources_are_ignored() {
        let mut doc = load_yaml("Resources:\n  Bucket:\n    Type: AWS::S3::Bucket\n");

        LambdaInlineCodeUpdater::new("Bucket", "exit 0")
            .update(&mut doc)
            .expect("update succeeds");
        LambdaInlineCodeUpdater::new("Missing", "exit 0")
            .update(&mut doc)
            .expect("update succeeds");

        assert!(!doc.is_dirty());
    }
}
