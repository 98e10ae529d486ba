use log::debug;

use stackpatch_core::Document;

use super::TemplateUpdater;
use crate::{StackpatchError, merge};

/// Copies parameters, resources, conditions and mappings that a template
/// lacks from a source template.
#[derive(Debug, Clone)]
pub struct NewResourcesAdder {
    source: Document,
}

impl NewResourcesAdder {
    pub fn new(source: Document) -> Self {
        Self { source }
    }
}

impl TemplateUpdater for NewResourcesAdder {
    fn update(&mut self, doc: &mut Document) -> Result<(), StackpatchError> {
        let added = merge::add_missing(doc, &self.source);
        if added == 0 {
            debug!("Template already has every entity of the source");
        }
        Ok(())
    }
}
