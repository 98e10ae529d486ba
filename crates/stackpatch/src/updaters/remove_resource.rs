use log::debug;

use stackpatch_core::Document;

use super::TemplateUpdater;
use crate::{StackpatchError, remove};

/// Removes resources and the entities that refer to them.
#[derive(Debug, Clone)]
pub struct ResourceRemover {
    names: Vec<String>,
}

impl ResourceRemover {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl TemplateUpdater for ResourceRemover {
    fn update(&mut self, doc: &mut Document) -> Result<(), StackpatchError> {
        for name in &self.names {
            if !remove::remove_resource(doc, name) {
                debug!(resource = name.as_str(); "Resource not in template");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{load_yaml, write_yaml};

    #[test]
    fn test_removes_each_name() {
        let mut doc = load_yaml(
            "Resources:\n  A: {}\n  B: {}\n  C: {}\nOutputs:\n  AName:\n    Value: !Ref A\n  BName:\n    Value: !Ref B\n",
        );
        let mut remover = ResourceRemover::new(vec!["A".to_string(), "C".to_string()]);

        remover.update(&mut doc).expect("update succeeds");

        assert!(doc.is_dirty());
        assert_eq!(
            write_yaml(&doc),
            "Resources:\n  B: {}\nOutputs:\n  BName:\n    Value: !Ref B\n"
        );
    }

    #[test]
    fn test_unknown_names_leave_template_clean() {
        let mut doc = load_yaml("Resources:\n  A: {}\n");
        let mut remover = ResourceRemover::new(vec!["Z".to_string()]);

        remover.update(&mut doc).expect("update succeeds");
        assert!(!doc.is_dirty());
    }
}
