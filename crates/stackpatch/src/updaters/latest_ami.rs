use log::{debug, info};

use stackpatch_core::{Document, Node};

use super::{TemplateUpdater, resource_type};
use crate::{
    StackpatchError,
    catalog::{ImageCatalog, ImageQuery},
    versions,
};

const CUSTOM_AMI: &str = "Custom::AMI";
const NAME_FILTER: [&str; 3] = ["Properties", "Filters", "name"];

/// Points `Custom::AMI` resources at the latest image matching a name
/// pattern.
///
/// Only resources whose `Properties.Filters.name` matches the pattern are
/// considered. Their other filters, `Owners`, `ImageIds` and
/// `ExecutableUsers` narrow the lookup for that resource. The name filter is
/// either updated in place or, with [`with_new_version`], written to a new
/// version of the resource that takes over its references.
///
/// [`with_new_version`]: LatestAmiUpdater::with_new_version
#[derive(Debug)]
pub struct LatestAmiUpdater<C> {
    catalog: C,
    query: ImageQuery,
    add_new_version: bool,
}

impl<C: ImageCatalog> LatestAmiUpdater<C> {
    /// Creates an updater for images whose name matches the glob `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`StackpatchError::InvalidArgument`] if the pattern is not a
    /// valid glob.
    pub fn new(catalog: C, pattern: &str) -> Result<Self, StackpatchError> {
        Ok(Self {
            catalog,
            query: ImageQuery::new(pattern)?,
            add_new_version: false,
        })
    }

    /// Adds a new version of each resource family instead of changing the
    /// latest member in place.
    pub fn with_new_version(mut self, add_new_version: bool) -> Self {
        self.add_new_version = add_new_version;
        self
    }

    fn is_matching_ami(&self, resource: &Node) -> bool {
        resource_type(resource) == Some(CUSTOM_AMI)
            && resource
                .get_path(&NAME_FILTER)
                .and_then(Node::as_str)
                .is_some_and(|name| self.query.is_name_match(name))
    }

    fn matching_resources(&self, doc: &Document) -> Vec<String> {
        doc.resources()
            .map(|resources| {
                resources
                    .iter()
                    .filter(|(_, resource)| self.is_matching_ami(resource))
                    .map(|(name, _)| name.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Looks up the latest image for the filters of `resource`.
    fn latest_name(&self, resource: &Node) -> Result<Option<String>, StackpatchError> {
        let query = resource_query(self.query.name_pattern(), resource)?;
        let latest = self.catalog.latest(&query)?;
        Ok(latest.map(|image| image.name))
    }

    fn update_in_place(&self, doc: &mut Document) -> Result<(), StackpatchError> {
        for name in self.matching_resources(doc) {
            let Some(resources) = doc.resources_mut() else {
                break;
            };
            let Some(resource) = resources.get_mut(&name) else {
                continue;
            };
            let Some(latest) = self.latest_name(resource)? else {
                debug!(resource = name.as_str(); "No image matches the resource filters");
                continue;
            };
            if set_name_filter(resource, &latest) {
                info!(resource = name.as_str(), image = latest.as_str(); "Updated AMI name filter");
                doc.mark_dirty();
            } else {
                debug!(resource = name.as_str(); "AMI name filter is up to date");
            }
        }
        Ok(())
    }

    fn add_versions(&self, doc: &mut Document) -> Result<(), StackpatchError> {
        let names = self.matching_resources(doc);
        for mut family in versions::families(names.iter().map(String::as_str)) {
            let Some(resource) = family
                .current()
                .and_then(|current| doc.resources()?.get(current))
            else {
                continue;
            };
            let Some(latest) = self.latest_name(resource)? else {
                debug!(family = family.base(); "No image matches the resource filters");
                continue;
            };
            versions::add_version(doc, &mut family, |copy| set_name_filter(copy, &latest));
        }
        Ok(())
    }
}

impl<C: ImageCatalog> TemplateUpdater for LatestAmiUpdater<C> {
    fn prepare(&mut self) -> Result<(), StackpatchError> {
        let Some(latest) = self.catalog.latest(&self.query)? else {
            return Err(StackpatchError::ExternalLookupEmpty {
                pattern: self.query.name_pattern().to_string(),
            });
        };
        info!(
            image = latest.name.as_str(),
            pattern = self.query.name_pattern(),
            created = latest.creation_date.as_str();
            "Using latest image"
        );
        Ok(())
    }

    fn update(&mut self, doc: &mut Document) -> Result<(), StackpatchError> {
        if self.add_new_version {
            self.add_versions(doc)
        } else {
            self.update_in_place(doc)
        }
    }
}

/// Builds the catalog query for a `Custom::AMI` resource.
///
/// The `name` and `state` filters of the resource are replaced by the
/// pattern and the available state.
fn resource_query(pattern: &str, resource: &Node) -> Result<ImageQuery, StackpatchError> {
    let mut query = ImageQuery::new(pattern)?;
    let Some(properties) = resource.get("Properties") else {
        return Ok(query);
    };

    if let Some(filters) = properties.get("Filters").and_then(Node::as_mapping) {
        for (key, values) in filters.iter() {
            if matches!(key, "name" | "state") {
                continue;
            }
            query = query.with_filter(key, &string_values(values))?;
        }
    }
    if let Some(owners) = properties.get("Owners") {
        query = query.with_owners(string_values(owners));
    }
    if let Some(image_ids) = properties.get("ImageIds") {
        query = query.with_image_ids(string_values(image_ids));
    }
    if let Some(users) = properties.get("ExecutableUsers") {
        query = query.with_executable_users(string_values(users));
    }
    Ok(query)
}

/// Scalar text of a value or of each item of a list. Account ids are often
/// written as plain numbers, so the kind is ignored.
fn string_values(node: &Node) -> Vec<String> {
    match node {
        Node::Sequence(sequence) => sequence
            .iter()
            .filter_map(Node::as_scalar)
            .map(|scalar| scalar.value().to_string())
            .collect(),
        Node::Scalar(scalar) => vec![scalar.value().to_string()],
        Node::Mapping(_) => Vec::new(),
    }
}

fn set_name_filter(resource: &mut Node, image_name: &str) -> bool {
    let Some(name) = resource
        .get_path_mut(&NAME_FILTER)
        .and_then(Node::as_scalar_mut)
    else {
        return false;
    };
    if name.as_str() == Some(image_name) {
        return false;
    }
    name.set_value(image_name);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::StaticCatalog,
        test_utils::{load_yaml, resource_str, write_yaml},
    };

    const CATALOG: &str = r#"
[[images]]
image_id = "ami-1"
name = "amzn-ami-2017.09.a-amazon-ecs-optimized"
creation_date = "2017-10-01T00:00:00.000Z"
owner_alias = "amazon"

[[images]]
image_id = "ami-2"
name = "amzn-ami-2017.09.l-amazon-ecs-optimized"
creation_date = "2018-03-01T00:00:00.000Z"
owner_alias = "amazon"

[[images]]
image_id = "ami-3"
name = "amzn-ami-2017.09.z-amazon-ecs-optimized"
creation_date = "2018-06-01T00:00:00.000Z"
owner_alias = "someone-else"

[[images]]
image_id = "ami-4"
name = "amzn-ami-2018.03.a-amazon-ecs-optimized"
creation_date = "2018-07-01T00:00:00.000Z"
state = "pending"
owner_alias = "amazon"
"#;

    const PATTERN: &str = "amzn-ami-*ecs-optimized";

    fn updater() -> LatestAmiUpdater<StaticCatalog> {
        let catalog = StaticCatalog::from_toml(CATALOG).expect("valid catalog");
        LatestAmiUpdater::new(catalog, PATTERN).expect("valid pattern")
    }

    const TEMPLATE: &str = r#"AWSTemplateFormatVersion: '2010-09-09'
Resources:
  CustomAMI:
    Type: Custom::AMI
    Properties:
      Filters:
        name: amzn-ami-2017.09.a-amazon-ecs-optimized
      Owners:
        - amazon
  OtherAMI:
    Type: Custom::AMI
    Properties:
      Filters:
        name: ubuntu-*
  Instance:
    Type: AWS::EC2::Instance
    Properties:
      ImageId: !Ref CustomAMI
"#;

    #[test]
    fn test_prepare_fails_without_match() {
        let catalog = StaticCatalog::from_toml(CATALOG).expect("valid catalog");
        let mut unmatched = LatestAmiUpdater::new(catalog, "debian-*").expect("valid pattern");

        let err = unmatched.prepare().expect_err("no image matches");
        assert!(matches!(
            err,
            StackpatchError::ExternalLookupEmpty { ref pattern } if pattern == "debian-*"
        ));
        assert!(updater().prepare().is_ok());
    }

    #[test]
    fn test_update_in_place_uses_resource_filters() {
        let mut doc = load_yaml(TEMPLATE);
        let mut updater = updater();

        updater.update(&mut doc).expect("update succeeds");

        assert!(doc.is_dirty());
        // ami-3 is newer but owned by someone else, ami-4 is not available.
        assert_eq!(
            write_yaml(&doc),
            TEMPLATE.replace(
                "name: amzn-ami-2017.09.a-amazon-ecs-optimized",
                "name: amzn-ami-2017.09.l-amazon-ecs-optimized"
            )
        );

        doc.mark_clean();
        updater.update(&mut doc).expect("second update succeeds");
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_add_new_version() {
        let mut doc = load_yaml(TEMPLATE);
        let mut updater = updater().with_new_version(true);

        updater.update(&mut doc).expect("update succeeds");

        assert_eq!(
            resource_str(&doc, &["CustomAMI", "Properties", "Filters", "name"]),
            Some("amzn-ami-2017.09.a-amazon-ecs-optimized")
        );
        assert_eq!(
            resource_str(&doc, &["CustomAMIv1", "Properties", "Filters", "name"]),
            Some("amzn-ami-2017.09.l-amazon-ecs-optimized")
        );
        assert_eq!(
            resource_str(&doc, &["Instance", "Properties", "ImageId"]),
            Some("CustomAMIv1")
        );
        let names: Vec<&str> = doc.resources().expect("resources").keys().collect();
        assert_eq!(names, ["CustomAMI", "CustomAMIv1", "OtherAMI", "Instance"]);

        doc.mark_clean();
        updater.update(&mut doc).expect("second update succeeds");
        assert!(!doc.is_dirty());
    }

    #[test]
    fn test_filter_values() {
        let doc = load_yaml(
            "Resources:\n  A:\n    Properties:\n      Filters:\n        name: x\n        tag:Team: [core, infra]\n      Owners: 137112412989\n      ExecutableUsers: [all]\n",
        );
        let resource = doc.resources().and_then(|r| r.get("A")).expect("resource");
        let owners = resource
            .get_path(&["Properties", "Owners"])
            .map(string_values);
        assert_eq!(owners, Some(vec!["137112412989".to_string()]));
        assert!(resource_query(PATTERN, resource).is_ok());
    }
}
