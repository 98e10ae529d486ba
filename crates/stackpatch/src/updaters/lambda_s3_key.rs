use indexmap::IndexMap;
use log::{debug, info};
use winnow::{
    ModalResult, Parser as _,
    combinator::{alt, opt, preceded, separated},
    token::{one_of, take_while},
};

use stackpatch_core::{Document, Node};

use super::{TemplateUpdater, resource_type};
use crate::StackpatchError;

const LAMBDA_FUNCTION: &str = "AWS::Lambda::Function";

/// Sets the `Code.S3Key` of Lambda functions to a newer release.
///
/// Keys have the form `<prefix><semver>.zip`. A function is updated when its
/// current key has the same prefix as one of the configured keys, so
/// `lambdas/iam-sudo-0.3.1.zip` replaces `lambdas/iam-sudo-0.1.0.zip` but
/// leaves `lambdas/cfn-secret-provider-1.0.0.zip` alone.
#[derive(Debug, Clone)]
pub struct LambdaS3KeyUpdater {
    keys: IndexMap<String, String>,
}

impl LambdaS3KeyUpdater {
    /// Creates an updater for the given S3 keys.
    ///
    /// # Errors
    ///
    /// Returns [`StackpatchError::InvalidArgument`] if a key does not end in
    /// a semantic version followed by `.zip`. A later key with the same
    /// prefix replaces an earlier one.
    pub fn new(keys: &[String]) -> Result<Self, StackpatchError> {
        let mut by_prefix = IndexMap::new();
        for key in keys {
            let Some(prefix) = release_prefix(key) else {
                return Err(StackpatchError::InvalidArgument(format!(
                    "{key} is not a semver S3Key"
                )));
            };
            by_prefix.insert(prefix.to_string(), key.clone());
        }
        Ok(Self { keys: by_prefix })
    }

    /// The configured keys, one per prefix.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.values().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn replacement(&self, current: &str) -> Option<&str> {
        let prefix = release_prefix(current)?;
        self.keys.get(prefix).map(String::as_str)
    }
}

/// The part of `key` before its version, or `None` if `key` is not of the
/// form `<prefix><semver>.zip`.
///
/// The version starts at the first digit from which the rest parses, so
/// `api-10.1.0.zip` has the prefix `api-` and `v2-1.0.0.zip` has `v2-`.
fn release_prefix(key: &str) -> Option<&str> {
    let stem = key.strip_suffix(".zip")?;
    stem.char_indices()
        .filter(|(_, c)| c.is_ascii_digit())
        .map(|(idx, _)| idx)
        .find(|&idx| semver.parse(&stem[idx..]).is_ok())
        .map(|idx| &key[..idx])
}

fn semver(input: &mut &str) -> ModalResult<()> {
    (
        numeric,
        '.',
        numeric,
        '.',
        numeric,
        opt(preceded('-', separated(1.., pre_release, '.').map(|()| ()))),
        opt(preceded('+', separated(1.., identifier, '.').map(|()| ()))),
    )
    .void()
    .parse_next(input)
}

fn numeric<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    let non_zero = (one_of('1'..='9'), take_while(0.., '0'..='9')).take();
    alt(("0", non_zero)).parse_next(input)
}

/// A pre-release identifier; numeric ones have no leading zero.
fn pre_release<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    identifier
        .verify(|id: &str| {
            !id.bytes().all(|b| b.is_ascii_digit()) || id == "0" || !id.starts_with('0')
        })
        .parse_next(input)
}

fn identifier<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., ('0'..='9', 'a'..='z', 'A'..='Z', '-')).parse_next(input)
}

impl TemplateUpdater for LambdaS3KeyUpdater {
    fn update(&mut self, doc: &mut Document) -> Result<(), StackpatchError> {
        let Some(resources) = doc.resources_mut() else {
            return Ok(());
        };

        let mut changed = false;
        for (name, resource) in resources.iter_mut() {
            if resource_type(resource) != Some(LAMBDA_FUNCTION) {
                continue;
            }
            let Some(s3_key) = resource
                .get_path_mut(&["Properties", "Code", "S3Key"])
                .and_then(Node::as_scalar_mut)
                .filter(|scalar| scalar.tag().is_none())
            else {
                continue;
            };
            let Some(current) = s3_key.as_str() else {
                continue;
            };
            let Some(new_key) = self.replacement(current) else {
                continue;
            };
            if current == new_key {
                debug!(resource = name; "S3Key is up to date");
                continue;
            }

            info!(resource = name, s3_key = new_key; "Updating S3Key of Lambda function");
            s3_key.set_value(new_key);
            changed = true;
        }

        if changed {
            doc.mark_dirty();
        }
        Ok(())
    }
}
