use indexmap::IndexMap;
use log::{debug, info};

use stackpatch_core::{Document, Node};

use super::{TemplateUpdater, resource_type};
use crate::StackpatchError;

const TASK_DEFINITION: &str = "AWS::ECS::TaskDefinition";

/// Sets the image of ECS container definitions.
///
/// A container is updated when its current image has the same repository
/// as one of the configured images, ignoring the tag. So `nginx:1.27`
/// replaces `nginx:1.25` but leaves `redis:7` alone.
#[derive(Debug, Clone)]
pub struct ContainerImageUpdater {
    images: IndexMap<String, String>,
}

impl ContainerImageUpdater {
    /// Creates an updater for images of the form `repository:tag`.
    ///
    /// # Errors
    ///
    /// Returns [`StackpatchError::InvalidArgument`] if an image does not
    /// contain exactly one `:`, or if two different images share a
    /// repository.
    pub fn new(images: &[String]) -> Result<Self, StackpatchError> {
        let mut by_repository: IndexMap<String, String> = IndexMap::new();
        for image in images {
            let Some((repository, _)) = split_image(image) else {
                return Err(StackpatchError::InvalidArgument(format!(
                    "{image} is an invalid image name"
                )));
            };
            match by_repository.get(repository) {
                Some(existing) if existing != image => {
                    return Err(StackpatchError::InvalidArgument(format!(
                        "image already defined for {repository}"
                    )));
                }
                Some(_) => {}
                None => {
                    by_repository.insert(repository.to_string(), image.clone());
                }
            }
        }
        Ok(Self {
            images: by_repository,
        })
    }

    /// The configured images, one per repository.
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.images.values().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn replacement(&self, current: &str) -> Option<&str> {
        let repository = current.split(':').next().unwrap_or(current);
        self.images.get(repository).map(String::as_str)
    }
}

fn split_image(image: &str) -> Option<(&str, &str)> {
    let (repository, tag) = image.split_once(':')?;
    (!tag.contains(':')).then_some((repository, tag))
}

impl TemplateUpdater for ContainerImageUpdater {
    fn update(&mut self, doc: &mut Document) -> Result<(), StackpatchError> {
        let Some(resources) = doc.resources_mut() else {
            return Ok(());
        };

        let mut changed = false;
        for (task, resource) in resources.iter_mut() {
            if resource_type(resource) != Some(TASK_DEFINITION) {
                continue;
            }
            let Some(containers) = resource
                .get_path_mut(&["Properties", "ContainerDefinitions"])
                .and_then(Node::as_sequence_mut)
            else {
                continue;
            };

            for container in containers.iter_mut() {
                let name = container
                    .get("Name")
                    .and_then(Node::as_str)
                    .unwrap_or_default()
                    .to_string();
                let Some(image) = container
                    .get_mut("Image")
                    .and_then(Node::as_scalar_mut)
                    .filter(|scalar| scalar.tag().is_none())
                else {
                    continue;
                };
                let Some(current) = image.as_str() else {
                    continue;
                };
                let Some(new_image) = self.replacement(current) else {
                    continue;
                };
                if current == new_image {
                    debug!(task = task, container = name.as_str(); "Container image is up to date");
                    continue;
                }

                info!(
                    task = task,
                    container = name.as_str(),
                    image = new_image;
                    "Updating container image"
                );
                image.set_value(new_image);
                changed = true;
            }
        }

        if changed {
            doc.mark_dirty();
        }
        Ok(())
    }
}
