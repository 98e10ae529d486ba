//! Combining documents.

use log::{info, warn};

use stackpatch_core::{Document, Mapping, Node, ScalarKind, Section};

/// Copies the entities of `source` that `target` lacks.
///
/// Parameters, Resources, Conditions and Mappings are considered; entities
/// already present in `target` are never replaced. A missing section is
/// appended to the root. Copied entries keep their comments.
///
/// Returns the number of entities added.
pub fn add_missing(target: &mut Document, source: &Document) -> usize {
    let mut added = 0;
    for section in Section::ENTITIES {
        let Some(entities) = source.section(section) else {
            continue;
        };
        for (name, entry) in entities.entries() {
            if target.section(section).is_some_and(|t| t.contains_key(name)) {
                continue;
            }
            let Some(destination) = section_or_insert(target, section) else {
                warn!(section:% = section; "Section is not a mapping, cannot add entities");
                break;
            };
            destination.insert_entry(name, entry.clone());
            info!(section:% = section, entity = name; "Added missing entity");
            added += 1;
        }
    }

    if added > 0 {
        target.mark_dirty();
    }
    added
}

/// Returns the mapping of `section`, creating it if the key is absent or
/// holds null.
fn section_or_insert(doc: &mut Document, section: Section) -> Option<&mut Mapping> {
    let root = doc.root_mut().as_mapping_mut()?;
    let is_null = match root.get(section.as_str()) {
        None => true,
        Some(node) => node.as_scalar().is_some_and(|s| s.kind() == ScalarKind::Null),
    };
    if is_null {
        root.insert(section.as_str(), Mapping::new());
    }
    root.get_mut(section.as_str())
        .and_then(Node::as_mapping_mut)
}

/// Merges `overlay` into `base`.
///
/// Mappings are merged key by key, recursively. Anything else in `overlay`
/// replaces the value in `base`: scalars win and sequences are replaced as a
/// whole. Keys only present in `overlay` are appended.
pub fn deep_merge(base: &mut Node, overlay: &Node) {
    match (base, overlay) {
        (Node::Mapping(base), Node::Mapping(overlay)) => {
            for (key, entry) in overlay.entries() {
                match base.get_mut(key) {
                    Some(existing) => deep_merge(existing, &entry.node),
                    None => {
                        base.insert_entry(key, entry.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
