//! Machine image catalogs.
//!
//! The latest-image updater asks an [`ImageCatalog`] for the images matching
//! an [`ImageQuery`] and picks the newest one. [`StaticCatalog`] answers
//! from a list of images kept in a TOML file:
//!
//! ```toml
//! [[images]]
//! image_id = "ami-0123"
//! name = "amzn-ami-2018.03.a-amazon-ecs-optimized"
//! creation_date = "2018-03-01T10:00:00.000Z"
//! owner_alias = "amazon"
//! public = true
//! ```

use std::{fs, path::Path};

use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::StackpatchError;

/// State of an image that can be launched.
pub const AVAILABLE: &str = "available";

/// A machine image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Image {
    pub image_id: String,
    pub name: String,
    /// ISO 8601 timestamp; later timestamps sort higher.
    pub creation_date: String,
    #[serde(default = "available")]
    pub state: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner_alias: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub architecture: Option<String>,
    /// Accounts allowed to launch the image.
    #[serde(default)]
    pub launch_permissions: Vec<String>,
    #[serde(default)]
    pub tags: IndexMap<String, String>,
}

fn available() -> String {
    AVAILABLE.to_string()
}

impl Image {
    /// Looks up the value a filter key is compared against.
    fn attribute(&self, key: &str) -> Option<String> {
        if let Some(tag) = key.strip_prefix("tag:") {
            return self.tags.get(tag).cloned();
        }
        match key {
            "name" => Some(self.name.clone()),
            "image-id" => Some(self.image_id.clone()),
            "state" => Some(self.state.clone()),
            "owner-id" => self.owner_id.clone(),
            "owner-alias" => self.owner_alias.clone(),
            "architecture" => self.architecture.clone(),
            "is-public" => Some(self.public.to_string()),
            _ => None,
        }
    }
}

/// Selection criteria for [`ImageCatalog::describe_images`].
///
/// Every criterion must hold. Filter values are glob patterns and a filter
/// matches if any of its values does.
#[derive(Debug, Clone)]
pub struct ImageQuery {
    name_pattern: String,
    name: GlobMatcher,
    state: String,
    filters: Vec<(String, GlobSet)>,
    owners: Vec<String>,
    image_ids: Vec<String>,
    executable_users: Vec<String>,
}

impl ImageQuery {
    /// Creates a query for available images whose name matches the glob
    /// `name_pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`StackpatchError::InvalidArgument`] if the pattern is not a
    /// valid glob.
    pub fn new(name_pattern: &str) -> Result<Self, StackpatchError> {
        let name = Glob::new(name_pattern)
            .map_err(|err| invalid_glob(name_pattern, &err))?
            .compile_matcher();
        Ok(Self {
            name_pattern: name_pattern.to_string(),
            name,
            state: AVAILABLE.to_string(),
            filters: Vec::new(),
            owners: Vec::new(),
            image_ids: Vec::new(),
            executable_users: Vec::new(),
        })
    }

    /// Adds a filter on an image attribute such as `owner-alias` or
    /// `tag:Team`.
    ///
    /// The name and state filters are fixed by the query and cannot be
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns [`StackpatchError::InvalidArgument`] if a value is not a valid
    /// glob.
    pub fn with_filter(
        mut self,
        key: impl Into<String>,
        values: &[String],
    ) -> Result<Self, StackpatchError> {
        let key = key.into();
        if matches!(key.as_str(), "name" | "state") {
            debug!(filter = key.as_str(); "Ignoring fixed filter");
            return Ok(self);
        }

        let mut builder = GlobSetBuilder::new();
        for value in values {
            builder.add(Glob::new(value).map_err(|err| invalid_glob(value, &err))?);
        }
        let set = builder.build().map_err(|err| invalid_glob(&key, &err))?;
        self.filters.push((key, set));
        Ok(self)
    }

    /// Restricts images to the given owner ids or aliases.
    pub fn with_owners(mut self, owners: Vec<String>) -> Self {
        self.owners = owners;
        self
    }

    pub fn with_image_ids(mut self, image_ids: Vec<String>) -> Self {
        self.image_ids = image_ids;
        self
    }

    /// Restricts images to those the given accounts may launch. `all`
    /// stands for public images.
    pub fn with_executable_users(mut self, users: Vec<String>) -> Self {
        self.executable_users = users;
        self
    }

    pub fn name_pattern(&self) -> &str {
        &self.name_pattern
    }

    /// Returns `true` if `name` matches the name pattern.
    pub fn is_name_match(&self, name: &str) -> bool {
        self.name.is_match(name)
    }

    /// Returns `true` if `image` satisfies every criterion.
    pub fn matches(&self, image: &Image) -> bool {
        let filters_match = self.filters.iter().all(|(key, values)| {
            image
                .attribute(key)
                .is_some_and(|value| values.is_match(value.as_str()))
        });
        let owner_match = self.owners.is_empty()
            || self.owners.iter().any(|owner| {
                image.owner_id.as_deref() == Some(owner.as_str())
                    || image.owner_alias.as_deref() == Some(owner.as_str())
            });
        let executable_match = self.executable_users.is_empty()
            || self.executable_users.iter().any(|user| {
                (user == "all" && image.public) || image.launch_permissions.contains(user)
            });

        self.is_name_match(&image.name)
            && image.state == self.state
            && filters_match
            && owner_match
            && (self.image_ids.is_empty() || self.image_ids.contains(&image.image_id))
            && executable_match
    }
}

fn invalid_glob(pattern: &str, err: &globset::Error) -> StackpatchError {
    StackpatchError::InvalidArgument(format!("invalid pattern `{pattern}`: {err}"))
}

/// A source of machine images.
pub trait ImageCatalog {
    /// Returns the images matching `query`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    fn describe_images(&self, query: &ImageQuery) -> Result<Vec<Image>, StackpatchError>;

    /// Returns the matching image with the latest creation date.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    fn latest(&self, query: &ImageQuery) -> Result<Option<Image>, StackpatchError> {
        let images = self.describe_images(query)?;
        Ok(images
            .into_iter()
            .max_by(|a, b| a.creation_date.cmp(&b.creation_date)))
    }
}

/// An image catalog held in memory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    images: Vec<Image>,
}

impl StaticCatalog {
    pub fn new(images: Vec<Image>) -> Self {
        Self { images }
    }

    /// Parses a catalog from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`StackpatchError::Config`] if the text is not a valid
    /// catalog.
    pub fn from_toml(text: &str) -> Result<Self, StackpatchError> {
        toml::from_str(text)
            .map_err(|err| StackpatchError::Config(format!("invalid image catalog: {err}")))
    }

    /// Reads a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`StackpatchError::NotFound`] if the file does not exist and
    /// [`StackpatchError::Config`] if it is not a valid catalog.
    pub fn load(path: &Path) -> Result<Self, StackpatchError> {
        if !path.exists() {
            return Err(StackpatchError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let catalog = Self::from_toml(&text)?;
        debug!(path:% = path.display(), images = catalog.images.len(); "Loaded image catalog");
        Ok(catalog)
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }
}

impl ImageCatalog for StaticCatalog {
    fn describe_images(&self, query: &ImageQuery) -> Result<Vec<Image>, StackpatchError> {
        Ok(self
            .images
            .iter()
            .filter(|image| query.matches(image))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[images]]
image_id = "ami-1"
name = "amzn-ami-2017.09.a-amazon-ecs-optimized"
creation_date = "2017-09-01T00:00:00.000Z"
owner_alias = "amazon"
public = true

[[images]]
image_id = "ami-2"
name = "amzn-ami-2018.03.a-amazon-ecs-optimized"
creation_date = "2018-03-01T00:00:00.000Z"
owner_alias = "amazon"
public = true
tags = { Team = "platform" }

[[images]]
image_id = "ami-3"
name = "amzn-ami-2019.01.a-amazon-ecs-optimized"
creation_date = "2019-01-01T00:00:00.000Z"
state = "pending"
owner_alias = "amazon"

[[images]]
image_id = "ami-4"
name = "windows-2019"
creation_date = "2020-01-01T00:00:00.000Z"
owner_id = "801119661308"
launch_permissions = ["123456789012"]
"#;

    fn catalog() -> StaticCatalog {
        StaticCatalog::from_toml(CATALOG).expect("valid catalog")
    }

    fn ids(query: &ImageQuery) -> Vec<String> {
        let mut ids: Vec<String> = catalog()
            .describe_images(query)
            .expect("static catalog")
            .into_iter()
            .map(|image| image.image_id)
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_latest_available_image() {
        let query = ImageQuery::new("amzn-ami-*ecs-optimized").expect("valid glob");
        let latest = catalog().latest(&query).expect("static catalog");

        assert_eq!(
            latest.map(|image| image.image_id).as_deref(),
            Some("ami-2")
        );
        assert_eq!(ids(&query), ["ami-1", "ami-2"]);
    }

    #[test]
    fn test_filters() {
        let query = ImageQuery::new("*")
            .and_then(|query| query.with_filter("tag:Team", &["plat*".to_string()]))
            .expect("valid query");
        assert_eq!(ids(&query), ["ami-2"]);

        let query = ImageQuery::new("*")
            .and_then(|query| query.with_filter("is-public", &["false".to_string()]))
            .expect("valid query");
        assert_eq!(ids(&query), ["ami-4"]);

        let query = ImageQuery::new("*")
            .and_then(|query| query.with_filter("unknown", &["x".to_string()]))
            .expect("valid query");
        assert!(ids(&query).is_empty());
    }

    #[test]
    fn test_name_and_state_filters_are_fixed() {
        let query = ImageQuery::new("windows-*")
            .and_then(|query| query.with_filter("name", &["amzn-*".to_string()]))
            .and_then(|query| query.with_filter("state", &["pending".to_string()]))
            .expect("valid query");
        assert_eq!(ids(&query), ["ami-4"]);
    }

    #[test]
    fn test_owners_ids_and_users() {
        let base = || ImageQuery::new("*").expect("valid glob");

        assert_eq!(
            ids(&base().with_owners(vec!["amazon".to_string()])),
            ["ami-1", "ami-2"]
        );
        assert_eq!(
            ids(&base().with_owners(vec!["801119661308".to_string()])),
            ["ami-4"]
        );
        assert!(ids(&base().with_owners(vec!["microsoft".to_string()])).is_empty());
        assert_eq!(
            ids(&base().with_image_ids(vec!["ami-1".to_string()])),
            ["ami-1"]
        );
        assert_eq!(
            ids(&base().with_executable_users(vec!["all".to_string()])),
            ["ami-1", "ami-2"]
        );
        assert_eq!(
            ids(&base().with_executable_users(vec!["123456789012".to_string()])),
            ["ami-4"]
        );
    }

    #[test]
    fn test_invalid_glob() {
        let err = ImageQuery::new("amzn-[").expect_err("unclosed class");
        assert!(matches!(err, StackpatchError::InvalidArgument(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = StaticCatalog::load(Path::new("does/not/exist.toml")).expect_err("missing");
        assert!(matches!(err, StackpatchError::NotFound(_)));
    }

    #[test]
    fn test_invalid_catalog() {
        let err = StaticCatalog::from_toml("[[images]]\nname = 1\n").expect_err("invalid");
        assert!(matches!(err, StackpatchError::Config(_)));
    }
}
